//! Global relocation of unsatisfied agents into empty houses.
//!
//! Runs on the coordinator once every worker has reported. All unsatisfied
//! agents and empty houses are pooled globally, the race labels are
//! randomly permuted across the pool, and the records are regrouped by
//! their post-shuffle occupancy -- each record keeping its original
//! position. Permuting labels over the pool is behaviorally equivalent to
//! drawing a random empty house per agent without replacement, in O(pool)
//! instead of O(agents) sequential removals, and supply always matches
//! demand because every pooled record is exactly one of occupied/empty
//! before and after the shuffle.
//!
//! Both output groups are re-tagged with the point-mode partitioner and
//! re-chunked into worker-indexed scatter slots for the next round.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use enclave_partition::{PartitionError, chunk_by_partition, partition_points};
use enclave_types::{House, PartitionStrategy, Race};

/// The relocation output: per-worker scatter slots for the next round.
///
/// Both vectors are indexed by partition number with slot 0 (the
/// coordinator) always `None`; a worker that receives nothing gets the
/// `None` sentinel rather than an empty vector.
#[derive(Debug, Clone)]
pub struct Relocation {
    /// Newly placed agents, now satisfied at their new positions.
    pub satisfied_agents: Vec<Option<Vec<House>>>,
    /// The post-shuffle empty houses (including vacated positions).
    pub empty_houses: Vec<Option<Vec<House>>>,
}

/// Relocate every unsatisfied agent into a uniformly random empty house.
///
/// `unsatisfied` and `empty` are the per-worker sets gathered this round,
/// indexed by partition number (`None` and empty entries both mean "this
/// worker contributed nothing"). If either global pool is empty the
/// operation is a no-op that returns the other pool re-chunked in its
/// own role.
pub fn relocate<R: Rng + ?Sized>(
    unsatisfied: &[Option<Vec<House>>],
    empty: &[Option<Vec<House>>],
    partitions: u32,
    strategy: PartitionStrategy,
    rng: &mut R,
) -> Result<Relocation, PartitionError> {
    let agents = flatten(unsatisfied);
    let vacancies = flatten(empty);
    debug!(
        agents = agents.len(),
        vacancies = vacancies.len(),
        "Relocation pools gathered"
    );

    if agents.is_empty() || vacancies.is_empty() {
        return Ok(Relocation {
            satisfied_agents: rechunk(&agents, partitions, strategy)?,
            empty_houses: rechunk(&vacancies, partitions, strategy)?,
        });
    }

    // Pool both groups and permute only the race column; positions stay.
    let mut pool: Vec<House> = agents;
    pool.extend(vacancies);
    let mut races: Vec<Option<Race>> = pool.iter().map(|h| h.race).collect();
    races.shuffle(rng);

    let mut now_occupied: Vec<House> = Vec::new();
    let mut now_empty: Vec<House> = Vec::new();
    for (house, race) in pool.into_iter().zip(races) {
        let shuffled = House {
            race,
            x: house.x,
            y: house.y,
        };
        if shuffled.is_occupied() {
            now_occupied.push(shuffled);
        } else {
            now_empty.push(shuffled);
        }
    }

    debug!(
        satisfied = now_occupied.len(),
        empty = now_empty.len(),
        "Relocation pools regrouped"
    );
    Ok(Relocation {
        satisfied_agents: rechunk(&now_occupied, partitions, strategy)?,
        empty_houses: rechunk(&now_empty, partitions, strategy)?,
    })
}

/// Concatenate per-worker sets, treating absent contributions as empty.
fn flatten(slots: &[Option<Vec<House>>]) -> Vec<House> {
    slots
        .iter()
        .flatten()
        .flat_map(|houses| houses.iter().copied())
        .collect()
}

/// Tag a group with the point-mode partitioner and chunk it into slots.
fn rechunk(
    houses: &[House],
    partitions: u32,
    strategy: PartitionStrategy,
) -> Result<Vec<Option<Vec<House>>>, PartitionError> {
    if houses.is_empty() {
        // chunk_by_partition would produce this too; skip the tagging.
        return Ok(vec![None; (partitions as usize).saturating_add(1)]);
    }
    let tags = partition_points(houses, partitions, strategy)?;
    Ok(chunk_by_partition(houses, &tags, partitions))
}
