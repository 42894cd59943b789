#[cfg(test)]
mod tests {
    use crate::merkle::{depth_for_size, fold_path, MerkleProof, MerkleTree};
    use crate::utils::poseidon_hash;
    use pasta_curves::pallas;

    fn leaves(count: u64) -> Vec<pallas::Base> {
        (1..=count).map(pallas::Base::from).collect()
    }

    fn verifies_against(tree: &MerkleTree, proof: &MerkleProof) -> bool {
        proof.root == tree.root() && proof.verify()
    }

    #[test]
    fn test_merkle_tree_creation() {
        let tree = MerkleTree::new(leaves(4));
        let l = leaves(4);
        let expected = poseidon_hash(poseidon_hash(l[0], l[1]), poseidon_hash(l[2], l[3]));
        assert_eq!(tree.root(), expected);
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_single_leaf_is_its_own_root() {
        let tree = MerkleTree::new(leaves(1));
        assert_eq!(tree.root(), pallas::Base::from(1));
        assert_eq!(tree.depth(), 0);
        assert!(tree.generate_proof(0).unwrap().siblings.is_empty());
    }

    #[test]
    fn test_empty_tree_root_is_zero() {
        let tree = MerkleTree::default();
        assert_eq!(tree.root(), pallas::Base::zero());
        assert_eq!(tree.size(), 0);
        assert!(tree.generate_proof(0).is_none());
    }

    #[test]
    fn test_odd_level_pads_with_zero() {
        let l = leaves(3);
        let tree = MerkleTree::new(l.clone());
        let expected = poseidon_hash(
            poseidon_hash(l[0], l[1]),
            poseidon_hash(l[2], pallas::Base::zero()),
        );
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_incremental_inserts_match_batch_build() {
        let mut incremental = MerkleTree::default();
        for (i, leaf) in leaves(9).into_iter().enumerate() {
            assert_eq!(incremental.insert(leaf), i);
            let batch = MerkleTree::new(leaves(i as u64 + 1));
            assert_eq!(incremental.root(), batch.root(), "size {}", i + 1);
        }
    }

    #[test]
    fn test_merkle_proof_generation() {
        let tree = MerkleTree::new(leaves(4));
        let proof = tree.generate_proof(0).unwrap();

        assert_eq!(proof.leaf, pallas::Base::from(1));
        assert_eq!(proof.root, tree.root());
        assert_eq!(proof.siblings.len(), tree.depth());
    }

    #[test]
    fn test_merkle_proof_verification() {
        let tree = MerkleTree::new(leaves(5));
        for index in 0..5 {
            let proof = tree.generate_proof(index).unwrap();
            assert!(verifies_against(&tree, &proof), "index {index}");
            assert_eq!(fold_path(proof.leaf, index, &proof.siblings), tree.root());
        }
    }

    #[test]
    fn test_merkle_proof_invalid_verification() {
        let tree1 = MerkleTree::new(leaves(4));
        let tree2 = MerkleTree::new((5..=8).map(pallas::Base::from).collect());

        let proof = tree1.generate_proof(0).unwrap();

        // Proof from a different tree
        assert!(!verifies_against(&tree2, &proof));
    }

    #[test]
    fn test_large_merkle_tree() {
        let tree = MerkleTree::new(leaves(1024));
        let proof = tree.generate_proof(512).unwrap();

        assert_eq!(proof.siblings.len(), 10);
        assert!(verifies_against(&tree, &proof));
    }

    #[test]
    fn test_merkle_proof_with_invalid_index() {
        let tree = MerkleTree::new(leaves(4));
        assert!(tree.generate_proof(999).is_none());
    }

    #[test]
    fn test_update_refreshes_root() {
        let mut tree = MerkleTree::new(leaves(3));
        let before = tree.root();
        assert!(tree.update(1, pallas::Base::zero()));
        assert_ne!(tree.root(), before);

        let mut expected = leaves(3);
        expected[1] = pallas::Base::zero();
        assert_eq!(tree.root(), MerkleTree::new(expected).root());
        assert!(!tree.update(3, pallas::Base::one()));
    }

    #[test]
    fn test_merkle_proof_with_tampered_parts() {
        let tree = MerkleTree::new(leaves(4));

        let mut proof = tree.generate_proof(0).unwrap();
        proof.root = pallas::Base::from(0xFF);
        assert!(!verifies_against(&tree, &proof));

        let mut proof = tree.generate_proof(0).unwrap();
        proof.leaf = pallas::Base::from(0xFF);
        assert!(!proof.verify());

        let mut proof = tree.generate_proof(0).unwrap();
        proof.siblings[0] = pallas::Base::from(0xFF);
        assert!(!proof.verify());

        let mut proof = tree.generate_proof(0).unwrap();
        proof.index = 4;
        assert!(!proof.verify());
    }

    #[test]
    fn test_depth_for_size() {
        assert_eq!(depth_for_size(0), 0);
        assert_eq!(depth_for_size(1), 0);
        assert_eq!(depth_for_size(2), 1);
        assert_eq!(depth_for_size(3), 2);
        assert_eq!(depth_for_size(4), 2);
        assert_eq!(depth_for_size(5), 3);
        assert_eq!(depth_for_size(1 << 20), 20);
    }
}
