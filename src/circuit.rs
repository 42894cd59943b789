//! ZK-SNARK circuit for group membership with a scoped nullifier.
//!
//! For a fixed tree depth the circuit proves knowledge of a secret `s` such
//! that, with `A = s·G` on Pallas:
//!
//! - the leaf `Poseidon(A.x, A.y)` and a private sibling path fold to the
//!   public root,
//! - the public nullifier equals `Poseidon(hashed_scope, s)`.
//!
//! The hashed message and scope are bound to the instance column, so a proof
//! is tied to the signal it was made for.
//!
//! Every depth is its own circuit. Paths shorter than the depth are padded
//! with zero siblings; a per-level `active` flag keeps the running node
//! unchanged past the real path. Flags are boolean and can only drop from one
//! to zero, so the root is always read at the end of the real path.
//!
//! Instance rows: `[root, nullifier, hashed_message, hashed_scope]`.

use crate::artifacts::SnarkArtifacts;
use crate::error::{Result, SemaphoreError};
use crate::identity::{public_key_from_secret, Identity};
use crate::merkle::fold_path;
use crate::utils::poseidon_hash;
use halo2_gadgets::ecc::chip::{
    BaseFieldElem, EccChip, EccConfig, FixedPoint, FullScalar, ShortScalar,
};
use halo2_gadgets::ecc::{FixedPoints, NonIdentityPoint, ScalarVar};
use halo2_gadgets::poseidon::{
    primitives::{ConstantLength, P128Pow5T3},
    Hash as PoseidonHash, Pow5Chip, Pow5Config,
};
use halo2_gadgets::utilities::lookup_range_check::LookupRangeCheckConfig;
use halo2_proofs::{
    circuit::{AssignedCell, Layouter, SimpleFloorPlanner, Value},
    plonk::{
        self, create_proof, keygen_pk, keygen_vk, Advice, Circuit, Column, ConstraintSystem,
        Error, Expression, Fixed, Instance, ProvingKey, Selector, SingleVerifier, TableColumn,
        VerifyingKey,
    },
    poly::{commitment::Params, Rotation},
    transcript::{Blake2bRead, Blake2bWrite, Challenge255},
};
use log::warn;
use pasta_curves::arithmetic::{Coordinates, CurveAffine};
use pasta_curves::group::{Curve, Group as _};
use pasta_curves::{pallas, vesta};
use rand::rngs::OsRng;

/// Number of public inputs.
pub const PUBLIC_INPUTS: usize = 4;

const ROOT_ROW: usize = 0;
const NULLIFIER_ROW: usize = 1;
const MESSAGE_ROW: usize = 2;
const SCOPE_ROW: usize = 3;

/// Bits covered by one lookup in the range-check table.
const RANGE_CHECK_BITS: usize = 10;

/// Smallest `k` that fits the range-check table plus blinding rows.
const MIN_K: u32 = 11;

// Row estimates used to size the circuit, with headroom.
const SCALAR_MUL_ROWS: usize = 512;
const POSEIDON_ROWS: usize = 64;
const LEVEL_GATE_ROWS: usize = 2;
const FIXED_ROWS: usize = 16;

type Cell = AssignedCell<pallas::Base, pallas::Base>;

/// `k` (log2 of the row count) for the circuit of a given depth.
///
/// Sized from per-chip row estimates with headroom, and never below the
/// `k` that holds the range-check table.
#[must_use]
pub fn circuit_k(depth: usize) -> u32 {
    let rows = SCALAR_MUL_ROWS + (depth + 2) * POSEIDON_ROWS + depth * LEVEL_GATE_ROWS + FIXED_ROWS;
    (usize::BITS - rows.leading_zeros()).max(MIN_K)
}

/// The ECC chip is generic over a set of fixed bases. This circuit only does
/// variable-base multiplication, so the set is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoFixedBases {}

macro_rules! no_fixed_base {
    ($name:ident, $kind:ty) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum $name {}

        impl FixedPoint<pallas::Affine> for $name {
            type FixedScalarKind = $kind;

            fn generator(&self) -> pallas::Affine {
                match *self {}
            }

            fn u(&self) -> Vec<[[u8; 32]; 8]> {
                match *self {}
            }

            fn z(&self) -> Vec<u64> {
                match *self {}
            }
        }
    };
}

no_fixed_base!(NoFullScalarBase, FullScalar);
no_fixed_base!(NoShortScalarBase, ShortScalar);
no_fixed_base!(NoBaseFieldBase, BaseFieldElem);

impl FixedPoints<pallas::Affine> for NoFixedBases {
    type FullScalar = NoFullScalarBase;
    type ShortScalar = NoShortScalarBase;
    type Base = NoBaseFieldBase;
}

/// Column layout and chip configurations of [`SemaphoreCircuit`].
///
/// All ten advice columns belong to the ECC chip, with column 9 doubling as
/// the range-check running sum. The Poseidon chip reuses columns 5 to 8, and
/// the Merkle gates use columns 0 to 4. The first fixed
/// column also holds the constants that pin the generator and the first
/// `active` flag.
#[derive(Debug, Clone)]
pub struct SemaphoreConfig {
    advices: [Column<Advice>; 10],
    /// Public inputs, one per instance row.
    instance: Column<Instance>,
    /// 10-bit lookup table for the ECC chip's range checks.
    table_idx: TableColumn,
    /// Enables the "merkle swap" gate.
    q_swap: Selector,
    /// Enables the "merkle select" gate.
    q_select: Selector,
    poseidon: Pow5Config<pallas::Base, 3, 2>,
    ecc: EccConfig<NoFixedBases>,
}

/// Witnesses for one proof. Every vector has exactly `depth` entries.
///
/// Build one from [`CircuitInputs::circuit`] to prove, or with
/// [`SemaphoreCircuit::empty`] for key generation. Circuits of different
/// depths have different shapes and need their own keys.
#[derive(Debug, Clone)]
pub struct SemaphoreCircuit {
    depth: usize,
    /// The identity secret, used both as the scalar of `A = s·G` and as the
    /// nullifier key.
    secret: Value<pallas::Base>,
    hashed_message: Value<pallas::Base>,
    hashed_scope: Value<pallas::Base>,
    /// Sibling per level, zero past the real path.
    siblings: Vec<Value<pallas::Base>>,
    /// Index bit per level; one means the running node is the right child.
    indices: Vec<Value<pallas::Base>>,
    /// One for levels on the real path, zero for padding.
    active: Vec<Value<pallas::Base>>,
}

impl SemaphoreCircuit {
    /// The witness-free circuit used for key generation.
    #[must_use]
    pub fn empty(depth: usize) -> Self {
        SemaphoreCircuit {
            depth,
            secret: Value::unknown(),
            hashed_message: Value::unknown(),
            hashed_scope: Value::unknown(),
            siblings: vec![Value::unknown(); depth],
            indices: vec![Value::unknown(); depth],
            active: vec![Value::unknown(); depth],
        }
    }

    /// Number of Merkle levels this circuit folds.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Circuit<pallas::Base> for SemaphoreCircuit {
    type Config = SemaphoreConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::empty(self.depth)
    }

    fn configure(meta: &mut ConstraintSystem<pallas::Base>) -> Self::Config {
        let advices: [Column<Advice>; 10] = std::array::from_fn(|_| meta.advice_column());
        for advice in advices {
            meta.enable_equality(advice);
        }
        let instance = meta.instance_column();
        meta.enable_equality(instance);

        // Shared between the ECC chip's Lagrange coefficients and the
        // Poseidon round constants; the first column also holds constants.
        let fixed: [Column<Fixed>; 8] = std::array::from_fn(|_| meta.fixed_column());
        meta.enable_constant(fixed[0]);

        let table_idx = meta.lookup_table_column();
        let range_check = LookupRangeCheckConfig::configure(meta, advices[9], table_idx);
        let ecc = EccChip::<NoFixedBases>::configure(meta, advices, fixed, range_check);

        let poseidon = Pow5Chip::<pallas::Base, 3, 2>::configure::<P128Pow5T3>(
            meta,
            [advices[6], advices[7], advices[8]],
            advices[5],
            [fixed[2], fixed[3], fixed[4]],
            [fixed[5], fixed[6], fixed[7]],
        );

        let q_swap = meta.selector();
        let q_select = meta.selector();

        // Orders (node, sibling) into (left, right) by the index bit.
        meta.create_gate("merkle swap", |meta| {
            let q = meta.query_selector(q_swap);
            let node = meta.query_advice(advices[0], Rotation::cur());
            let sibling = meta.query_advice(advices[1], Rotation::cur());
            let bit = meta.query_advice(advices[2], Rotation::cur());
            let left = meta.query_advice(advices[3], Rotation::cur());
            let right = meta.query_advice(advices[4], Rotation::cur());
            let one = Expression::Constant(pallas::Base::one());

            vec![
                q.clone() * bit.clone() * (one - bit.clone()),
                q.clone()
                    * (left - (node.clone() + bit.clone() * (sibling.clone() - node.clone()))),
                q * (right - (sibling.clone() + bit * (node - sibling))),
            ]
        });

        // next = active ? parent : node, with active <= previous active.
        meta.create_gate("merkle select", |meta| {
            let q = meta.query_selector(q_select);
            let parent = meta.query_advice(advices[0], Rotation::cur());
            let node = meta.query_advice(advices[1], Rotation::cur());
            let active = meta.query_advice(advices[2], Rotation::cur());
            let previous = meta.query_advice(advices[3], Rotation::cur());
            let next = meta.query_advice(advices[4], Rotation::cur());
            let one = Expression::Constant(pallas::Base::one());

            vec![
                q.clone() * active.clone() * (one.clone() - active.clone()),
                q.clone() * active.clone() * (one - previous),
                q * (next - (node.clone() + active * (parent - node))),
            ]
        });

        SemaphoreConfig {
            advices,
            instance,
            table_idx,
            q_swap,
            q_select,
            poseidon,
            ecc,
        }
    }

    fn synthesize(
        &self,
        config: Self::Config,
        mut layouter: impl Layouter<pallas::Base>,
    ) -> std::result::Result<(), Error> {
        load_range_table(&config, &mut layouter)?;
        let ecc_chip = EccChip::construct(config.ecc.clone());

        let (secret, hashed_message, hashed_scope) = layouter.assign_region(
            || "load witnesses",
            |mut region| {
                let secret =
                    region.assign_advice(|| "secret", config.advices[0], 0, || self.secret)?;
                let message = region.assign_advice(
                    || "hashed message",
                    config.advices[1],
                    0,
                    || self.hashed_message,
                )?;
                let scope = region.assign_advice(
                    || "hashed scope",
                    config.advices[2],
                    0,
                    || self.hashed_scope,
                )?;
                Ok((secret, message, scope))
            },
        )?;

        // A = secret·G, with G pinned to the Pallas generator.
        let (generator, generator_x, generator_y) = generator()?;
        let base = NonIdentityPoint::new(
            ecc_chip.clone(),
            layouter.namespace(|| "witness generator"),
            Value::known(generator),
        )?;
        layouter.assign_region(
            || "pin generator",
            |mut region| {
                let x = region.assign_advice_from_constant(
                    || "G.x",
                    config.advices[0],
                    0,
                    generator_x,
                )?;
                let y = region.assign_advice_from_constant(
                    || "G.y",
                    config.advices[1],
                    0,
                    generator_y,
                )?;
                region.constrain_equal(x.cell(), base.inner().x().cell())?;
                region.constrain_equal(y.cell(), base.inner().y().cell())
            },
        )?;
        let scalar = ScalarVar::from_base(
            ecc_chip.clone(),
            layouter.namespace(|| "secret as scalar"),
            &secret,
        )?;
        let (public_key, _) = base.mul(layouter.namespace(|| "[secret] G"), scalar)?;

        let mut node = hash(
            &config,
            layouter.namespace(|| "commitment"),
            [public_key.inner().x(), public_key.inner().y()],
        )?;

        let mut previous_active: Option<Cell> = None;
        for level in 0..self.depth {
            let (left, right) = layouter.assign_region(
                || format!("swap level {level}"),
                |mut region| {
                    config.q_swap.enable(&mut region, 0)?;
                    let current = node.copy_advice(|| "node", &mut region, config.advices[0], 0)?;
                    region.assign_advice(
                        || "sibling",
                        config.advices[1],
                        0,
                        || self.siblings[level],
                    )?;
                    region.assign_advice(
                        || "index bit",
                        config.advices[2],
                        0,
                        || self.indices[level],
                    )?;

                    let inputs = current
                        .value()
                        .copied()
                        .zip(self.siblings[level])
                        .zip(self.indices[level]);
                    let left = region.assign_advice(
                        || "left",
                        config.advices[3],
                        0,
                        || inputs.map(|((node, sibling), bit)| node + bit * (sibling - node)),
                    )?;
                    let right = region.assign_advice(
                        || "right",
                        config.advices[4],
                        0,
                        || inputs.map(|((node, sibling), bit)| sibling + bit * (node - sibling)),
                    )?;
                    Ok((left, right))
                },
            )?;

            let parent = hash(
                &config,
                layouter.namespace(|| format!("parent level {level}")),
                [left, right],
            )?;

            let (next, active) = layouter.assign_region(
                || format!("select level {level}"),
                |mut region| {
                    config.q_select.enable(&mut region, 0)?;
                    let parent =
                        parent.copy_advice(|| "parent", &mut region, config.advices[0], 0)?;
                    let current = node.copy_advice(|| "node", &mut region, config.advices[1], 0)?;
                    let active = region.assign_advice(
                        || "active",
                        config.advices[2],
                        0,
                        || self.active[level],
                    )?;
                    match &previous_active {
                        Some(previous) => {
                            previous.copy_advice(
                                || "previous active",
                                &mut region,
                                config.advices[3],
                                0,
                            )?;
                        }
                        None => {
                            region.assign_advice_from_constant(
                                || "previous active",
                                config.advices[3],
                                0,
                                pallas::Base::one(),
                            )?;
                        }
                    }

                    let next = parent
                        .value()
                        .copied()
                        .zip(current.value().copied())
                        .zip(self.active[level])
                        .map(|((parent, node), active)| node + active * (parent - node));
                    let next = region.assign_advice(|| "next", config.advices[4], 0, || next)?;
                    Ok((next, active))
                },
            )?;

            node = next;
            previous_active = Some(active);
        }

        let nullifier = hash(
            &config,
            layouter.namespace(|| "nullifier"),
            [hashed_scope.clone(), secret],
        )?;

        layouter.constrain_instance(node.cell(), config.instance, ROOT_ROW)?;
        layouter.constrain_instance(nullifier.cell(), config.instance, NULLIFIER_ROW)?;
        layouter.constrain_instance(hashed_message.cell(), config.instance, MESSAGE_ROW)?;
        layouter.constrain_instance(hashed_scope.cell(), config.instance, SCOPE_ROW)?;

        Ok(())
    }
}

/// Poseidon over two cells with the `P128Pow5T3` parameters, matching
/// [`poseidon_hash`] outside the circuit.
fn hash(
    config: &SemaphoreConfig,
    mut layouter: impl Layouter<pallas::Base>,
    inputs: [Cell; 2],
) -> std::result::Result<Cell, Error> {
    let chip = Pow5Chip::construct(config.poseidon.clone());
    let hasher = PoseidonHash::<_, _, P128Pow5T3, ConstantLength<2>, 3, 2>::init(
        chip,
        layouter.namespace(|| "poseidon init"),
    )?;
    hasher.hash(layouter.namespace(|| "poseidon hash"), inputs)
}

/// Fills the lookup table with `0..2^10`.
fn load_range_table(
    config: &SemaphoreConfig,
    layouter: &mut impl Layouter<pallas::Base>,
) -> std::result::Result<(), Error> {
    layouter.assign_table(
        || "range check table",
        |mut table| {
            for index in 0..(1usize << RANGE_CHECK_BITS) {
                table.assign_cell(
                    || "table_idx",
                    config.table_idx,
                    index,
                    || Value::known(pallas::Base::from(index as u64)),
                )?;
            }
            Ok(())
        },
    )
}

/// The Pallas generator and its affine coordinates.
fn generator() -> std::result::Result<(pallas::Affine, pallas::Base, pallas::Base), Error> {
    let generator = pallas::Point::generator().to_affine();
    let coordinates: Option<Coordinates<pallas::Affine>> = generator.coordinates().into();
    let coordinates = coordinates.ok_or(Error::Synthesis)?;
    Ok((generator, *coordinates.x(), *coordinates.y()))
}

/// Native inputs of one proof, before they are turned into witnesses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitInputs {
    pub depth: usize,
    pub secret: pallas::Base,
    /// Leaf index; bit `i` orders level `i`.
    pub index: usize,
    /// The real sibling path, at most `depth` entries.
    pub path: Vec<pallas::Base>,
    pub hashed_message: pallas::Base,
    pub hashed_scope: pallas::Base,
}

impl CircuitInputs {
    fn check(&self) -> Result<()> {
        if self.path.len() > self.depth {
            return Err(SemaphoreError::validation(format!(
                "a path of {} siblings does not fit a tree of depth {}",
                self.path.len(),
                self.depth
            )));
        }
        Ok(())
    }

    /// `[root, nullifier, hashed_message, hashed_scope]` as the circuit will
    /// compute them.
    pub fn public_inputs(&self) -> Result<[pallas::Base; PUBLIC_INPUTS]> {
        self.check()?;
        let public_key = public_key_from_secret(self.secret)
            .ok_or_else(|| SemaphoreError::validation("secret scalar is zero"))?;
        let leaf = Identity::generate_commitment(&public_key);

        Ok([
            fold_path(leaf, self.index, &self.path),
            poseidon_hash(self.hashed_scope, self.secret),
            self.hashed_message,
            self.hashed_scope,
        ])
    }

    /// The witnessed circuit, padded to `depth` levels.
    pub fn circuit(&self) -> Result<SemaphoreCircuit> {
        self.check()?;
        let length = self.path.len();
        let bit = |level: usize| {
            let set = level < usize::BITS as usize && (self.index >> level) & 1 == 1;
            pallas::Base::from(u64::from(level < length && set))
        };

        Ok(SemaphoreCircuit {
            depth: self.depth,
            secret: Value::known(self.secret),
            hashed_message: Value::known(self.hashed_message),
            hashed_scope: Value::known(self.hashed_scope),
            siblings: (0..self.depth)
                .map(|level| {
                    Value::known(self.path.get(level).copied().unwrap_or(pallas::Base::zero()))
                })
                .collect(),
            indices: (0..self.depth).map(|level| Value::known(bit(level))).collect(),
            active: (0..self.depth)
                .map(|level| Value::known(pallas::Base::from(u64::from(level < length))))
                .collect(),
        })
    }
}

/// Runs key generation for the circuit of `depth`.
///
/// # Arguments
///
/// * `depth` - Number of Merkle levels the keys are for
/// * `params` - IPA parameters of size `2^circuit_k(depth)` or larger
///
/// # Returns
///
/// The verifying key and the proving key built from it.
///
/// # Errors
///
/// Returns the halo2 error if the circuit does not fit in `params`.
pub fn keygen(
    depth: usize,
    params: &Params<vesta::Affine>,
) -> std::result::Result<(VerifyingKey<vesta::Affine>, ProvingKey<vesta::Affine>), Error> {
    let circuit = SemaphoreCircuit::empty(depth);
    let vk = keygen_vk(params, &circuit)?;
    let pk = keygen_pk(params, vk.clone(), &circuit)?;
    Ok((vk, pk))
}

/// Proves `inputs` with the artifacts of the matching depth.
///
/// # Arguments
///
/// * `artifacts` - Parameters and keys for `inputs.depth`
/// * `inputs` - The secret, membership path and hashed signal
///
/// # Returns
///
/// The Blake2b transcript and the public inputs it commits to, in instance
/// row order.
///
/// # Errors
///
/// - `Validation` if the artifacts are for another depth or the path is
///   longer than the depth.
/// - `Prover` if the proving engine rejects the witness.
pub fn prove(
    artifacts: &SnarkArtifacts,
    inputs: &CircuitInputs,
) -> Result<(Vec<u8>, [pallas::Base; PUBLIC_INPUTS])> {
    if artifacts.depth != inputs.depth {
        return Err(SemaphoreError::validation(format!(
            "artifacts are for depth {}, inputs for depth {}",
            artifacts.depth, inputs.depth
        )));
    }
    let public_inputs = inputs.public_inputs()?;
    let circuit = inputs.circuit()?;

    let mut transcript = Blake2bWrite::<_, vesta::Affine, Challenge255<_>>::init(vec![]);
    let instances: &[&[&[pallas::Base]]] = &[&[&public_inputs[..]]];
    create_proof(
        &artifacts.params,
        &artifacts.pk,
        &[circuit],
        instances,
        OsRng,
        &mut transcript,
    )
    .map_err(|e| SemaphoreError::Prover(format!("{e:?}")))?;

    Ok((transcript.finalize(), public_inputs))
}

/// Checks a transcript against the public inputs. Any failure is `false`.
///
/// The transcript must be consumed exactly: trailing bytes make an otherwise
/// valid proof fail, so each proof has a single accepted encoding.
#[must_use]
pub fn verify(
    artifacts: &SnarkArtifacts,
    proof: &[u8],
    public_inputs: &[pallas::Base; PUBLIC_INPUTS],
) -> bool {
    let mut reader = proof;
    let verified = {
        let strategy = SingleVerifier::new(&artifacts.params);
        let mut transcript = Blake2bRead::<_, vesta::Affine, Challenge255<_>>::init(&mut reader);
        let instances: &[&[&[pallas::Base]]] = &[&[&public_inputs[..]]];
        plonk::verify_proof(
            &artifacts.params,
            &artifacts.vk,
            strategy,
            instances,
            &mut transcript,
        )
        .is_ok()
    };
    if verified && !reader.is_empty() {
        warn!("Rejecting proof with {} trailing bytes", reader.len());
        return false;
    }
    verified
}
