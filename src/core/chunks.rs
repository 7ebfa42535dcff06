use crate::core::rules::ResourceMatcher;
use crate::utils::{Result, StrataError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

/// A named grouping constraint over module origins. Fields left unset
/// inherit the policy-wide defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkGroup {
    pub name: String,
    pub matcher: ResourceMatcher,
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_shared_users: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
    #[serde(default)]
    pub reuse_existing_chunk: bool,
}

impl ChunkGroup {
    pub fn new(name: impl Into<String>, matcher: ResourceMatcher, priority: i32) -> Self {
        Self {
            name: name.into(),
            matcher,
            priority,
            min_shared_users: None,
            max_bytes: None,
            reuse_existing_chunk: false,
        }
    }

    pub fn with_min_shared_users(mut self, min: usize) -> Self {
        self.min_shared_users = Some(min);
        self
    }

    pub fn with_max_bytes(mut self, max: u64) -> Self {
        self.max_bytes = Some(max);
        self
    }

    pub fn reuse_existing(mut self) -> Self {
        self.reuse_existing_chunk = true;
        self
    }
}

/// Catch-all for modules no group claims; its own sharing threshold keeps
/// rarely-shared modules inlined with their importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackChunk {
    pub name: String,
    pub min_shared_users: usize,
    #[serde(default)]
    pub reuse_existing_chunk: bool,
}

impl Default for FallbackChunk {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            min_shared_users: 2,
            reuse_existing_chunk: true,
        }
    }
}

/// Chunk-splitting policy carried by the merged configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPolicy {
    /// Size cap for any produced chunk, inherited by groups without their
    /// own.
    pub max_bytes: u64,
    /// Sharing threshold inherited by groups without their own.
    pub min_shared_users: usize,
    pub fallback: FallbackChunk,
    pub groups: Vec<ChunkGroup>,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 600_000,
            min_shared_users: 5,
            fallback: FallbackChunk::default(),
            groups: Vec::new(),
        }
    }
}

/// A module as the planner sees it: origin, final size, and the distinct
/// entry/chunk contexts importing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: String,
    pub origin: PathBuf,
    pub size: u64,
    #[serde(default)]
    pub users: BTreeSet<String>,
}

impl ModuleRecord {
    pub fn new(id: impl Into<String>, origin: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
            size,
            users: BTreeSet::new(),
        }
    }

    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users = users.into_iter().map(Into::into).collect();
        self
    }
}

/// One output bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub name: String,
    pub group: String,
    pub modules: Vec<String>,
    pub bytes: u64,
}

/// The planner's result: named chunks plus the modules that stay inlined
/// with their importing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChunkPlan {
    pub chunks: BTreeMap<String, Chunk>,
    pub inlined: BTreeMap<String, Vec<String>>,
}

impl ChunkPlan {
    pub fn chunk_of(&self, module_id: &str) -> Option<&Chunk> {
        self.chunks.values().find(|c| c.modules.iter().any(|m| m == module_id))
    }

    pub fn module_count(&self) -> usize {
        self.chunks.values().map(|c| c.modules.len()).sum()
    }

    pub fn inlined_count(&self) -> usize {
        self.inlined.values().map(|m| m.len()).sum()
    }
}

/// Greedy, priority-ordered, size-bounded bin assignment. This is a
/// heuristic, not an optimal packing: each module goes to the first
/// eligible group in descending priority, and a full chunk splits into
/// `name~1`, `name~2`, ... rather than violate the cap.
pub struct ChunkPlanner<'a> {
    policy: &'a ChunkPolicy,
}

impl<'a> ChunkPlanner<'a> {
    pub fn new(policy: &'a ChunkPolicy) -> Self {
        Self { policy }
    }

    /// Assign every module to a chunk. Deterministic over the given module
    /// order.
    pub fn assign(&self, modules: &[ModuleRecord]) -> Result<ChunkPlan> {
        let mut ordered: Vec<&ChunkGroup> = self.policy.groups.iter().collect();
        // stable sort keeps declaration order among equal priorities
        ordered.sort_by_key(|g| std::cmp::Reverse(g.priority));

        let mut acc = Accumulator::default();
        let mut plan = ChunkPlan::default();

        for module in modules {
            let mut eligible: Vec<&ChunkGroup> = Vec::new();
            for &group in &ordered {
                if !group.matcher.matches(&module.origin)? {
                    continue;
                }
                let min = group.min_shared_users.unwrap_or(self.policy.min_shared_users);
                if module.users.len() < min {
                    continue;
                }
                eligible.push(group);
            }

            let Some(primary) = eligible.first() else {
                if module.users.len() >= self.policy.fallback.min_shared_users {
                    acc.place(
                        &self.policy.fallback.name,
                        self.policy.max_bytes,
                        module,
                        &mut plan,
                    )?;
                } else {
                    // stays with its importer; entry modules have no users
                    // and stay with themselves
                    if module.users.is_empty() {
                        plan.inlined
                            .entry(module.id.clone())
                            .or_default()
                            .push(module.id.clone());
                    } else {
                        for user in &module.users {
                            plan.inlined
                                .entry(user.clone())
                                .or_default()
                                .push(module.id.clone());
                        }
                    }
                }
                continue;
            };

            let max = primary.max_bytes.unwrap_or(self.policy.max_bytes);
            acc.place(&primary.name, max, module, &mut plan)?;

            // A lower-priority match that opts out of reuse duplicates the
            // module into its own chunk; with reuse the prior placement
            // stands.
            for group in &eligible[1..] {
                if !group.reuse_existing_chunk {
                    let max = group.max_bytes.unwrap_or(self.policy.max_bytes);
                    acc.place(&group.name, max, module, &mut plan)?;
                }
            }
        }

        Ok(plan)
    }
}

#[derive(Default)]
struct Accumulator {
    // group name -> (open chunk name, open chunk bytes, split counter)
    open: HashMap<String, (String, u64, usize)>,
}

impl Accumulator {
    fn place(
        &mut self,
        group: &str,
        max_bytes: u64,
        module: &ModuleRecord,
        plan: &mut ChunkPlan,
    ) -> Result<()> {
        if module.size > max_bytes {
            return Err(StrataError::ChunkCapacity {
                module: module.id.clone(),
                size: module.size,
                max_bytes,
                group: group.to_string(),
            });
        }

        let state = self
            .open
            .entry(group.to_string())
            .or_insert_with(|| (group.to_string(), 0, 0));

        if state.1 + module.size > max_bytes {
            state.2 += 1;
            state.0 = format!("{}~{}", group, state.2);
            state.1 = 0;
        }
        state.1 += module.size;

        let chunk = plan
            .chunks
            .entry(state.0.clone())
            .or_insert_with(|| Chunk {
                name: state.0.clone(),
                group: group.to_string(),
                modules: Vec::new(),
                bytes: 0,
            });
        chunk.modules.push(module.id.clone());
        chunk.bytes += module.size;

        Ok(())
    }
}
