//! The set-lattice reasoner.
//!
//! Named sets are keyed by canonical formulas and connected by two parallel
//! subset relations over the same vertices: the intensional graph, derived by
//! the subset decider and kept a transitive reduction, and the extensional
//! graph, asserted by callers. Size bounds are computed by a branch-and-bound
//! search for maximum-weight cliques of pairwise-disjoint sets.

use std::collections::{BinaryHeap, HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernel::scope::{CanonicalizeError, Canonicalizer};
use crate::kernel::subset::{intersect, is_subset};
use crate::kernel::term::{Term, TermBank};

pub type SetId = u32;

/// The vertex holding the empty set (`formula = False`, size 0, fixed).
pub const EMPTY_SET: SetId = 0;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetInfo {
    pub formula: Arc<Term>,
    pub size: u32,
    pub fixed: bool,
}

#[derive(Clone, Debug, Error)]
pub enum LatticeError {
    #[error("size {size} violates the bounds [{lower}, {upper}]")]
    BoundViolation { size: u32, lower: u32, upper: u32 },
    #[error("the asserted subset relation is inconsistent with the size bounds")]
    Inconsistent,
    #[error("no set is associated with the given formula")]
    NoSuchSet,
    #[error(transparent)]
    Canonicalize(#[from] CanonicalizeError),
}

#[derive(Clone, Debug, Default)]
struct SetVertex {
    parents: Vec<SetId>,
    children: Vec<SetId>,
}

/// One directed acyclic subset graph; parents are supersets.
#[derive(Clone, Debug, Default)]
struct SetGraph {
    vertices: Vec<SetVertex>,
}

impl SetGraph {
    fn ensure(&mut self, id: SetId) {
        if self.vertices.len() <= id as usize {
            self.vertices.resize_with(id as usize + 1, SetVertex::default);
        }
    }

    fn parents(&self, id: SetId) -> &[SetId] {
        &self.vertices[id as usize].parents
    }

    fn children(&self, id: SetId) -> &[SetId] {
        &self.vertices[id as usize].children
    }

    fn add_edge(&mut self, parent: SetId, child: SetId) {
        self.vertices[parent as usize].children.push(child);
        self.vertices[child as usize].parents.push(parent);
    }

    fn remove_edge(&mut self, parent: SetId, child: SetId) {
        let children = &mut self.vertices[parent as usize].children;
        if let Some(index) = children.iter().position(|&c| c == child) {
            children.remove(index);
        }
        let parents = &mut self.vertices[child as usize].parents;
        if let Some(index) = parents.iter().position(|&p| p == parent) {
            parents.remove(index);
        }
    }

    fn has_edge(&self, parent: SetId, child: SetId) -> bool {
        self.vertices[parent as usize].children.contains(&child)
    }

    /// Detaches the vertex from all of its neighbors.
    fn clear_vertex(&mut self, id: SetId) {
        let parents = std::mem::take(&mut self.vertices[id as usize].parents);
        for parent in parents {
            let children = &mut self.vertices[parent as usize].children;
            children.retain(|&c| c != id);
        }
        let children = std::mem::take(&mut self.vertices[id as usize].children);
        for child in children {
            let parents = &mut self.vertices[child as usize].parents;
            parents.retain(|&p| p != id);
        }
    }
}

type DescendantCache = HashMap<SetId, Rc<HashSet<SetId>>>;

/// A node of the clique search: the clique built so far, the candidate
/// neighborhood still to try, the excluded set, and the vertex to expand
/// next. The priority is an upper bound on the total weight reachable from
/// this node.
#[derive(Clone, Debug)]
struct SearchState {
    clique: Vec<SetId>,
    neighborhood: Vec<SetId>,
    excluded: Vec<SetId>,
    next_set: SetId,
    priority: i64,
    ancestor: Option<SetId>,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &SearchState) -> bool {
        self.priority == other.priority
    }
}

impl Eq for SearchState {}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &SearchState) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchState {
    fn cmp(&self, other: &SearchState) -> std::cmp::Ordering {
        self.priority.cmp(&other.priority)
    }
}

/// Priority queue for the clique search. Pruning by a minimum priority is
/// sound because priorities bound the best completion of a state from above.
struct SearchQueue {
    queue: BinaryHeap<SearchState>,
    last_priority: i64,
}

impl SearchQueue {
    fn new() -> SearchQueue {
        SearchQueue {
            queue: BinaryHeap::new(),
            last_priority: i64::MAX,
        }
    }

    fn push(&mut self, state: SearchState) {
        if state.priority > self.last_priority {
            warn!(
                "clique search priority {} exceeds the last popped priority {}",
                state.priority, self.last_priority
            );
        }
        self.queue.push(state);
    }

    fn pop(&mut self) -> Option<SearchState> {
        let state = self.queue.pop()?;
        self.last_priority = state.priority;
        Some(state)
    }

    fn best_priority(&self) -> Option<i64> {
        self.queue.peek().map(|state| state.priority)
    }
}

#[derive(Clone, Copy)]
struct ProcessOptions {
    recurse_children: bool,
    test_completion: bool,
    return_on_completion: bool,
    min_priority: i64,
}

pub struct SetLattice {
    extensional: SetGraph,
    intensional: SetGraph,
    sets: Vec<Option<SetInfo>>,
    ids: HashMap<Arc<Term>, SetId>,
    canonicalizer: Canonicalizer,
}

impl SetLattice {
    pub fn new(bank: &mut TermBank) -> SetLattice {
        let mut lattice = SetLattice {
            extensional: SetGraph::default(),
            intensional: SetGraph::default(),
            sets: vec![],
            ids: HashMap::new(),
            canonicalizer: Canonicalizer::new(),
        };
        let empty = bank.fls();
        lattice.extensional.ensure(EMPTY_SET);
        lattice.intensional.ensure(EMPTY_SET);
        lattice.sets.push(Some(SetInfo {
            formula: empty.clone(),
            size: 0,
            fixed: true,
        }));
        lattice.ids.insert(empty, EMPTY_SET);
        lattice
    }

    pub fn set(&self, id: SetId) -> Option<&SetInfo> {
        self.sets.get(id as usize).and_then(Option::as_ref)
    }

    pub fn size(&self, id: SetId) -> Option<u32> {
        self.set(id).map(|info| info.size)
    }

    /// Number of live vertices.
    pub fn set_count(&self) -> usize {
        self.sets.iter().filter(|slot| slot.is_some()).count()
    }

    /// Immediate subsets in the derived (intensional) relation.
    pub fn intensional_children(&self, id: SetId) -> &[SetId] {
        self.intensional.children(id)
    }

    /// Immediate supersets in the derived (intensional) relation.
    pub fn intensional_parents(&self, id: SetId) -> &[SetId] {
        self.intensional.parents(id)
    }

    fn info(&self, id: SetId) -> &SetInfo {
        self.sets[id as usize]
            .as_ref()
            .expect("live vertex expected")
    }

    fn size_of(&self, id: SetId) -> u32 {
        self.info(id).size
    }

    /// The id for the canonicalization of `formula`, inserting a new vertex
    /// when the canonical formula has not been seen.
    pub fn get_or_create(
        &mut self,
        bank: &mut TermBank,
        formula: &Arc<Term>,
    ) -> Result<SetId, LatticeError> {
        let canonical = self.canonicalizer.canonicalize(bank, formula)?;
        if let Some(&id) = self.ids.get(&canonical) {
            return Ok(id);
        }
        self.new_set(bank, canonical)
    }

    /// The id for an already-canonical formula, if any.
    pub fn lookup(&self, formula: &Arc<Term>) -> Option<SetId> {
        self.ids.get(formula).copied()
    }

    fn next_free_id(&self) -> SetId {
        for (index, slot) in self.sets.iter().enumerate() {
            if slot.is_none() {
                return index as SetId;
            }
        }
        self.sets.len() as SetId
    }

    fn new_set(
        &mut self,
        bank: &mut TermBank,
        formula: Arc<Term>,
    ) -> Result<SetId, LatticeError> {
        let id = self.next_free_id();
        if id as usize == self.sets.len() {
            self.sets.push(None);
        }
        self.extensional.ensure(id);
        self.intensional.ensure(id);

        // find the existing sets related to the new one by inclusion
        let mut subsets = vec![];
        let mut supersets = vec![];
        for (index, slot) in self.sets.iter().enumerate() {
            let info = match slot {
                Some(info) => info,
                None => continue,
            };
            let other = index as SetId;
            if is_subset(&info.formula, &formula) {
                subsets.push(other);
            } else if is_subset(&formula, &info.formula) {
                supersets.push(other);
            }
        }

        // the minimal supersets become the immediate parents
        let parents = self.frontier(&supersets, false);
        for &parent in &parents {
            self.intensional.add_edge(parent, id);
        }
        // the maximal subsets become the immediate children
        let children = self.frontier(&subsets, true);
        for &child in &children {
            self.intensional.add_edge(id, child);
        }

        self.sets[id as usize] = Some(SetInfo {
            formula: formula.clone(),
            size: 0,
            fixed: false,
        });
        self.ids.insert(formula, id);

        // drop edges that now shortcut through the new vertex
        for &parent in &parents {
            for &child in &children {
                if self.intensional.has_edge(parent, child) {
                    self.intensional.remove_edge(parent, child);
                }
            }
        }

        let lower = self.size_lower_bound(bank, id)?;
        let upper = self.size_upper_bound(bank, id)?;
        let initial = if upper == u32::MAX {
            lower.saturating_add(10)
        } else {
            ((lower as u64 + upper as u64) / 2) as u32
        };
        self.sets[id as usize].as_mut().unwrap().size = initial;
        debug!("created set {} with initial size {}", id, initial);
        Ok(id)
    }

    /// The subset of `seeds` not reachable from another seed: with
    /// `downward` false, the minimal supersets (walking parents); with
    /// `downward` true, the maximal subsets (walking children).
    fn frontier(&self, seeds: &[SetId], downward: bool) -> Vec<SetId> {
        let mut reached: HashMap<SetId, u32> = HashMap::new();
        let mut stack = vec![];
        for &seed in seeds {
            match reached.get_mut(&seed) {
                Some(count) => *count += 1,
                None => {
                    reached.insert(seed, 0);
                    stack.push(seed);
                }
            }
            while let Some(vertex) = stack.pop() {
                let next = if downward {
                    self.intensional.children(vertex)
                } else {
                    self.intensional.parents(vertex)
                };
                for &neighbor in next {
                    match reached.get_mut(&neighbor) {
                        Some(count) => *count += 1,
                        None => {
                            reached.insert(neighbor, 1);
                            stack.push(neighbor);
                        }
                    }
                }
            }
        }
        let mut frontier: Vec<SetId> = reached
            .into_iter()
            .filter(|(_, count)| *count == 0)
            .map(|(vertex, _)| vertex)
            .collect();
        frontier.sort_unstable();
        frontier
    }

    fn is_freeable(&self, id: SetId) -> bool {
        match self.set(id) {
            Some(info) => {
                !info.fixed
                    && self.extensional.parents(id).is_empty()
                    && self.extensional.children(id).is_empty()
            }
            None => false,
        }
    }

    /// Removes a vertex, repairing the transitive reduction: intensional
    /// parents are reconnected to children they can no longer reach.
    fn free_set(&mut self, id: SetId) {
        let parents = self.intensional.parents(id).to_vec();
        let children = self.intensional.children(id).to_vec();
        let formula = self.info(id).formula.clone();
        self.extensional.clear_vertex(id);
        self.intensional.clear_vertex(id);
        self.sets[id as usize] = None;
        self.ids.remove(&formula);
        debug!("collected set {}", id);

        for &parent in &parents {
            let mut reachable = HashSet::new();
            let mut stack = vec![parent];
            while let Some(vertex) = stack.pop() {
                for &child in self.intensional.children(vertex) {
                    if reachable.insert(child) {
                        stack.push(child);
                    }
                }
            }
            for &child in &children {
                if !reachable.contains(&child) {
                    self.intensional.add_edge(parent, child);
                }
            }
        }
    }

    fn collect_if_freeable(&mut self, id: SetId) {
        if self.is_freeable(id) {
            self.free_set(id);
        }
    }

    /// Asserts `{x : antecedent} ⊆ {x : consequent}`. The edge is rolled
    /// back when it forces a lower bound above an upper bound.
    pub fn add_subset(
        &mut self,
        bank: &mut TermBank,
        antecedent: &Arc<Term>,
        consequent: &Arc<Term>,
    ) -> Result<(), LatticeError> {
        let antecedent_set = self.get_or_create(bank, antecedent)?;
        let consequent_set = match self.get_or_create(bank, consequent) {
            Ok(id) => id,
            Err(error) => {
                self.collect_if_freeable(antecedent_set);
                return Err(error);
            }
        };
        if antecedent_set == consequent_set {
            return Ok(());
        }
        self.extensional.add_edge(consequent_set, antecedent_set);

        let mut failure = None;
        for id in [antecedent_set, consequent_set] {
            match (
                self.size_lower_bound(bank, id),
                self.size_upper_bound(bank, id),
            ) {
                (Ok(lower), Ok(upper)) => {
                    // a fixed vertex forces its size as both bounds
                    let info = self.info(id);
                    let violated = if info.fixed {
                        info.size < lower || info.size > upper
                    } else {
                        lower > upper
                    };
                    if violated {
                        failure = Some(LatticeError::Inconsistent);
                        break;
                    }
                }
                (Err(error), _) | (_, Err(error)) => {
                    failure = Some(error);
                    break;
                }
            }
        }
        if let Some(error) = failure {
            self.extensional.remove_edge(consequent_set, antecedent_set);
            self.collect_if_freeable(consequent_set);
            self.collect_if_freeable(antecedent_set);
            return Err(error);
        }
        Ok(())
    }

    /// Retracts an asserted subset relation, collecting vertices that no
    /// longer carry any extensional edge.
    pub fn remove_subset(
        &mut self,
        bank: &mut TermBank,
        antecedent: &Arc<Term>,
        consequent: &Arc<Term>,
    ) -> Result<(), LatticeError> {
        let antecedent_canonical = self.canonicalizer.canonicalize(bank, antecedent)?;
        let consequent_canonical = self.canonicalizer.canonicalize(bank, consequent)?;
        let antecedent_set = self
            .lookup(&antecedent_canonical)
            .ok_or(LatticeError::NoSuchSet)?;
        let consequent_set = self
            .lookup(&consequent_canonical)
            .ok_or(LatticeError::NoSuchSet)?;
        if antecedent_set != consequent_set {
            self.extensional.remove_edge(consequent_set, antecedent_set);
        }
        self.collect_if_freeable(consequent_set);
        self.collect_if_freeable(antecedent_set);
        Ok(())
    }

    pub fn fix_size(&mut self, id: SetId) -> Result<(), LatticeError> {
        match self.sets.get_mut(id as usize).and_then(Option::as_mut) {
            Some(info) => {
                info.fixed = true;
                Ok(())
            }
            None => Err(LatticeError::NoSuchSet),
        }
    }

    pub fn unfix_size(&mut self, id: SetId) -> Result<(), LatticeError> {
        match self.sets.get_mut(id as usize).and_then(Option::as_mut) {
            Some(info) => {
                info.fixed = false;
                Ok(())
            }
            None => Err(LatticeError::NoSuchSet),
        }
    }

    /// Updates a size after validating it against the current bounds.
    pub fn set_size(
        &mut self,
        bank: &mut TermBank,
        id: SetId,
        size: u32,
    ) -> Result<(), LatticeError> {
        if self.set(id).is_none() {
            return Err(LatticeError::NoSuchSet);
        }
        let lower = self.size_lower_bound(bank, id)?;
        let upper = self.size_upper_bound(bank, id)?;
        if size < lower || size > upper {
            return Err(LatticeError::BoundViolation { size, lower, upper });
        }
        self.sets[id as usize].as_mut().unwrap().size = size;
        Ok(())
    }

    /// Pushes a size change even against the bounds. Reconciling the
    /// surrounding sets is not implemented, so a change that still violates
    /// a bound is reported as an error instead.
    pub fn force_set_size(
        &mut self,
        bank: &mut TermBank,
        id: SetId,
        size: u32,
    ) -> Result<(), LatticeError> {
        let current = self.size(id).ok_or(LatticeError::NoSuchSet)?;
        if size > current {
            let upper = self.size_upper_bound(bank, id)?;
            if size > upper {
                let lower = self.size_lower_bound(bank, id)?;
                return Err(LatticeError::BoundViolation { size, lower, upper });
            }
        } else if size < current {
            let lower = self.size_lower_bound(bank, id)?;
            if size < lower {
                let upper = self.size_upper_bound(bank, id)?;
                return Err(LatticeError::BoundViolation { size, lower, upper });
            }
        }
        self.sets[id as usize].as_mut().unwrap().size = size;
        Ok(())
    }

    /// Two sets are disjoint when their canonical intersection denotes the
    /// empty set.
    pub fn are_disjoint(
        &self,
        bank: &mut TermBank,
        first: SetId,
        second: SetId,
    ) -> Result<bool, LatticeError> {
        let intersection = intersect(
            bank,
            &self.info(first).formula,
            &self.info(second).formula,
        )?;
        if intersection.is_false() {
            return Ok(true);
        }
        Ok(self
            .lookup(&intersection)
            .map(|id| self.size_of(id) == 0)
            .unwrap_or(false))
    }

    /// The sum of sizes over a maximum-weight clique of pairwise-disjoint
    /// descendants.
    pub fn size_lower_bound(
        &self,
        bank: &mut TermBank,
        id: SetId,
    ) -> Result<u32, LatticeError> {
        match self.largest_disjoint_subset_clique(bank, id)? {
            Some(clique) => Ok(clique
                .iter()
                .map(|&member| self.size_of(member) as u64)
                .sum::<u64>()
                .min(u32::MAX as u64) as u32),
            None => Ok(0),
        }
    }

    /// The minimum over ancestors of the ancestor's size minus the weight of
    /// the heaviest disjoint clique around this set. `u32::MAX` stands for
    /// an unbounded size.
    pub fn size_upper_bound(
        &self,
        bank: &mut TermBank,
        id: SetId,
    ) -> Result<u32, LatticeError> {
        match self.largest_disjoint_clique_with_set(bank, id, None, i64::MIN)? {
            Some((mut clique, ancestor)) => {
                if let Some(index) = clique.iter().position(|&member| member == id) {
                    clique.remove(index);
                }
                let others: u64 = clique
                    .iter()
                    .map(|&member| self.size_of(member) as u64)
                    .sum();
                let ancestor_size = self.size_of(ancestor) as u64;
                Ok(ancestor_size.saturating_sub(others) as u32)
            }
            None => Ok(u32::MAX),
        }
    }

    fn descendants(&self, cache: &mut DescendantCache, root: SetId) -> Rc<HashSet<SetId>> {
        if let Some(found) = cache.get(&root) {
            return found.clone();
        }
        let mut set = HashSet::new();
        set.insert(root);
        let children: Vec<SetId> = self
            .extensional
            .children(root)
            .iter()
            .chain(self.intensional.children(root))
            .copied()
            .collect();
        for child in children {
            let child_descendants = self.descendants(cache, child);
            set.extend(child_descendants.iter().copied());
        }
        let set = Rc::new(set);
        cache.insert(root, set.clone());
        set
    }

    fn has_descendant(&self, cache: &mut DescendantCache, root: SetId, vertex: SetId) -> bool {
        self.descendants(cache, root).contains(&vertex)
    }

    /// Walks down from `root` collecting vertices disjoint from
    /// `set_to_expand` into the neighborhood; overlapping vertices are
    /// expanded through their children.
    fn expand_search_state(
        &self,
        bank: &mut TermBank,
        cache: &mut DescendantCache,
        visited: &mut HashSet<SetId>,
        neighborhood: &mut Vec<SetId>,
        set_to_expand: SetId,
        root: SetId,
    ) -> Result<(), LatticeError> {
        if !visited.insert(root) {
            return Ok(());
        }
        if self.size_of(root) == 0 {
            // weightless vertices (the empty set in particular) contribute
            // nothing and sit below every other vertex
            return Ok(());
        }
        if self.are_disjoint(bank, set_to_expand, root)? {
            let mut index = 0;
            while index < neighborhood.len() {
                if self.has_descendant(cache, neighborhood[index], root) {
                    neighborhood.remove(index);
                } else {
                    index += 1;
                }
            }
            neighborhood.push(root);
            return Ok(());
        }
        let children: Vec<SetId> = self
            .extensional
            .children(root)
            .iter()
            .chain(self.intensional.children(root))
            .copied()
            .collect();
        for child in children {
            if self.size_of(child) == 0 || visited.contains(&child) {
                continue;
            }
            let mut skip = false;
            for &neighbor in neighborhood.iter() {
                if self.has_descendant(cache, neighbor, child) {
                    skip = true;
                    break;
                }
            }
            if skip {
                continue;
            }
            self.expand_search_state(bank, cache, visited, neighborhood, set_to_expand, child)?;
        }
        Ok(())
    }

    /// Expands one search state: grows the clique with `next_set`, rebuilds
    /// the neighborhood, enqueues the successor states, and reports the
    /// completed clique when the state was maximal.
    fn process_search_state(
        &self,
        bank: &mut TermBank,
        cache: &mut DescendantCache,
        queue: &mut SearchQueue,
        state: &SearchState,
        options: ProcessOptions,
    ) -> Result<Option<Vec<SetId>>, LatticeError> {
        let mut new_clique = state.clique.clone();
        new_clique.push(state.next_set);

        let mut neighborhood = vec![];
        let mut visited = HashSet::new();
        for &excluded in &state.excluded {
            self.expand_search_state(
                bank,
                cache,
                &mut visited,
                &mut neighborhood,
                state.next_set,
                excluded,
            )?;
        }
        let new_excluded_count = neighborhood.len();
        for &neighbor in &state.neighborhood {
            self.expand_search_state(
                bank,
                cache,
                &mut visited,
                &mut neighborhood,
                state.next_set,
                neighbor,
            )?;
        }

        let ancestor_penalty = state
            .ancestor
            .map(|ancestor| self.size_of(ancestor) as i64)
            .unwrap_or(0);
        let mut priority = self.size_of(state.next_set) as i64;
        for &member in &state.clique {
            priority += self.size_of(member) as i64;
        }
        for &neighbor in &neighborhood[new_excluded_count..] {
            priority += self.size_of(neighbor) as i64;
        }

        for index in new_excluded_count..neighborhood.len() {
            if priority < options.min_priority {
                break;
            }
            queue.push(SearchState {
                clique: new_clique.clone(),
                neighborhood: neighborhood[index + 1..].to_vec(),
                excluded: neighborhood[..index].to_vec(),
                next_set: neighborhood[index],
                priority: priority - ancestor_penalty,
                ancestor: state.ancestor,
            });
            priority -= self.size_of(neighborhood[index]) as i64;
        }

        let completed = if options.test_completion
            && state.neighborhood.is_empty()
            && state.excluded.is_empty()
        {
            Some(new_clique)
        } else {
            None
        };
        if completed.is_some() && options.return_on_completion {
            return Ok(completed);
        }

        if options.recurse_children {
            let old_length = neighborhood.len();
            for &child in self.extensional.children(state.next_set) {
                if self.size_of(child) > 0 {
                    neighborhood.push(child);
                }
            }
            for &child in self.intensional.children(state.next_set) {
                if self.size_of(child) > 0
                    && !self.extensional.children(state.next_set).contains(&child)
                {
                    neighborhood.push(child);
                }
            }

            priority -= self.size_of(state.next_set) as i64;
            for &child in &neighborhood[old_length..] {
                priority += self.size_of(child) as i64;
            }

            for index in old_length..neighborhood.len() {
                if priority < options.min_priority {
                    break;
                }
                let child = neighborhood[index];
                if self.size_of(child) == 0 {
                    continue;
                }
                queue.push(SearchState {
                    clique: state.clique.clone(),
                    neighborhood: neighborhood[index + 1..].to_vec(),
                    excluded: neighborhood[..index].to_vec(),
                    next_set: child,
                    priority: priority - ancestor_penalty,
                    ancestor: state.ancestor,
                });
                priority -= self.size_of(child) as i64;
            }
        }

        Ok(completed)
    }

    /// The maximum-weight clique of pairwise-disjoint descendants of `root`.
    fn largest_disjoint_subset_clique(
        &self,
        bank: &mut TermBank,
        root: SetId,
    ) -> Result<Option<Vec<SetId>>, LatticeError> {
        let mut queue = SearchQueue::new();
        let mut cache = DescendantCache::new();
        let initial = SearchState {
            clique: vec![],
            neighborhood: vec![],
            excluded: vec![],
            next_set: root,
            priority: i64::MAX,
            ancestor: None,
        };
        let options = ProcessOptions {
            recurse_children: true,
            test_completion: false,
            return_on_completion: false,
            min_priority: i64::MIN,
        };
        self.process_search_state(bank, &mut cache, &mut queue, &initial, options)?;

        let options = ProcessOptions {
            recurse_children: true,
            test_completion: true,
            return_on_completion: true,
            min_priority: i64::MIN,
        };
        while let Some(state) = queue.pop() {
            if let Some(clique) =
                self.process_search_state(bank, &mut cache, &mut queue, &state, options)?
            {
                return Ok(Some(clique));
            }
        }
        Ok(None)
    }

    /// For every ancestor of `set`, the vertices adjacent to the ancestor
    /// but outside the ancestor cone, used to seed the clique search.
    fn non_ancestor_neighborhoods(
        &self,
        set: SetId,
        parent: Option<SetId>,
    ) -> HashMap<SetId, Vec<SetId>> {
        let mut neighborhoods: HashMap<SetId, Vec<SetId>> = HashMap::new();
        neighborhoods.insert(set, vec![]);

        let seed_parents: Vec<SetId> = match parent {
            Some(parent) => vec![parent],
            None => self
                .extensional
                .parents(set)
                .iter()
                .chain(self.intensional.parents(set))
                .copied()
                .collect(),
        };

        // collect the ancestor cone
        let mut stack = seed_parents.clone();
        while let Some(current) = stack.pop() {
            if neighborhoods.contains_key(&current) {
                continue;
            }
            neighborhoods.insert(current, vec![]);
            for &grandparent in self
                .extensional
                .parents(current)
                .iter()
                .chain(self.intensional.parents(current))
            {
                if !neighborhoods.contains_key(&grandparent) {
                    stack.push(grandparent);
                }
            }
        }

        // propagate non-ancestor neighbors upward to a fixed point
        let mut stack = seed_parents;
        while let Some(current) = stack.pop() {
            let mut changed = false;
            let mut neighborhood = neighborhoods.get(&current).cloned().unwrap_or_default();
            let children: Vec<SetId> = self
                .extensional
                .children(current)
                .iter()
                .chain(self.intensional.children(current))
                .copied()
                .collect();
            for child in children {
                match neighborhoods.get(&child) {
                    Some(child_neighborhood) if child != set => {
                        for &neighbor in child_neighborhood {
                            if !neighborhood.contains(&neighbor) {
                                neighborhood.push(neighbor);
                                changed = true;
                            }
                        }
                    }
                    Some(_) => {}
                    None => {
                        if !neighborhood.contains(&child) {
                            neighborhood.push(child);
                            changed = true;
                        }
                    }
                }
            }
            neighborhoods.insert(current, neighborhood);
            if changed {
                for &grandparent in self
                    .extensional
                    .parents(current)
                    .iter()
                    .chain(self.intensional.parents(current))
                {
                    stack.push(grandparent);
                }
            }
        }

        neighborhoods.remove(&set);
        neighborhoods
    }

    /// The maximum-weight disjoint clique containing `set`, over all of its
    /// ancestors (or the one given), together with the ancestor the clique
    /// lives under.
    fn largest_disjoint_clique_with_set(
        &self,
        bank: &mut TermBank,
        set: SetId,
        parent: Option<SetId>,
        min_priority: i64,
    ) -> Result<Option<(Vec<SetId>, SetId)>, LatticeError> {
        let neighborhoods = self.non_ancestor_neighborhoods(set, parent);

        let mut queue = SearchQueue::new();
        let mut cache = DescendantCache::new();
        let mut best: Option<(Vec<SetId>, SetId)> = None;
        let mut best_score = i64::MIN;

        let seed_options = ProcessOptions {
            recurse_children: false,
            test_completion: true,
            return_on_completion: false,
            min_priority,
        };
        for (&ancestor, neighborhood) in &neighborhoods {
            let initial = SearchState {
                clique: vec![],
                neighborhood: neighborhood.clone(),
                excluded: vec![],
                next_set: set,
                priority: i64::MAX,
                ancestor: Some(ancestor),
            };
            if let Some(clique) =
                self.process_search_state(bank, &mut cache, &mut queue, &initial, seed_options)?
            {
                // set is disjoint from everything around this ancestor
                best_score = self.size_of(set) as i64 - self.size_of(ancestor) as i64;
                best = Some((clique, ancestor));
            }
        }

        let options = ProcessOptions {
            recurse_children: true,
            test_completion: true,
            return_on_completion: true,
            min_priority,
        };
        while queue.best_priority().map_or(false, |p| p > best_score) {
            let state = match queue.pop() {
                Some(state) => state,
                None => break,
            };
            let ancestor = state.ancestor.expect("ancestor search state");
            if let Some(clique) =
                self.process_search_state(bank, &mut cache, &mut queue, &state, options)?
            {
                if queue.last_priority > best_score {
                    best_score = queue.last_priority;
                    best = Some((clique, ancestor));
                }
            }
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(bank: &mut TermBank, predicate: u32) -> Arc<Term> {
        let x = bank.variable(1);
        bank.atom1(predicate, x)
    }

    /// dog/cat/animal fixture: dog and cat disjoint, both subsets of animal.
    fn animal_lattice(bank: &mut TermBank) -> (SetLattice, SetId, SetId, SetId) {
        let mut lattice = SetLattice::new(bank);
        let dog = atom(bank, 1);
        let cat = atom(bank, 2);
        let animal = atom(bank, 3);

        // assert the intersection of dog and cat empty
        let both = bank.and(vec![dog.clone(), cat.clone()]);
        let both_id = lattice.get_or_create(bank, &both).unwrap();
        lattice.force_set_size(bank, both_id, 0).unwrap();
        lattice.fix_size(both_id).unwrap();

        lattice.add_subset(bank, &dog, &animal).unwrap();
        lattice.add_subset(bank, &cat, &animal).unwrap();
        let dog_id = lattice.get_or_create(bank, &dog).unwrap();
        let cat_id = lattice.get_or_create(bank, &cat).unwrap();
        let animal_id = lattice.get_or_create(bank, &animal).unwrap();
        (lattice, dog_id, cat_id, animal_id)
    }

    #[test]
    fn test_empty_set_vertex() {
        let mut bank = TermBank::new();
        let lattice = SetLattice::new(&mut bank);
        let info = lattice.set(EMPTY_SET).unwrap();
        assert!(info.formula.is_false());
        assert_eq!(info.size, 0);
        assert!(info.fixed);
    }

    #[test]
    fn test_get_or_create_is_keyed_canonically() {
        let mut bank = TermBank::new();
        let mut lattice = SetLattice::new(&mut bank);
        let x = bank.variable(1);
        let dog = bank.atom1(1, x.clone());
        let black = bank.atom1(2, x);
        let first = bank.and(vec![dog.clone(), black.clone()]);
        let second = bank.and(vec![black, dog]);
        let first_id = lattice.get_or_create(&mut bank, &first).unwrap();
        let second_id = lattice.get_or_create(&mut bank, &second).unwrap();
        assert_eq!(first_id, second_id);
    }

    #[test]
    fn test_intensional_edges_form_transitive_reduction() {
        let mut bank = TermBank::new();
        let mut lattice = SetLattice::new(&mut bank);
        let x = bank.variable(1);
        let dog = bank.atom1(1, x.clone());
        let black = bank.atom1(2, x.clone());
        let old = bank.atom1(3, x);
        let two = bank.and(vec![dog.clone(), black.clone()]);
        let three = bank.and(vec![dog.clone(), black, old]);

        let dog_id = lattice.get_or_create(&mut bank, &dog).unwrap();
        let three_id = lattice.get_or_create(&mut bank, &three).unwrap();
        assert!(lattice.intensional.has_edge(dog_id, three_id));

        // inserting the middle set reroutes the edge through it
        let two_id = lattice.get_or_create(&mut bank, &two).unwrap();
        assert!(!lattice.intensional.has_edge(dog_id, three_id));
        assert!(lattice.intensional.has_edge(dog_id, two_id));
        assert!(lattice.intensional.has_edge(two_id, three_id));
    }

    #[test]
    fn test_are_disjoint_via_contradiction() {
        let mut bank = TermBank::new();
        let lattice_bank = &mut bank;
        let mut lattice = SetLattice::new(lattice_bank);
        let x = lattice_bank.variable(1);
        let dog = lattice_bank.atom1(1, x.clone());
        let not_dog = lattice_bank.not(dog.clone());
        let dog_id = lattice.get_or_create(lattice_bank, &dog).unwrap();
        let other_id = lattice.get_or_create(lattice_bank, &not_dog).unwrap();
        assert!(lattice.are_disjoint(lattice_bank, dog_id, other_id).unwrap());
    }

    #[test]
    fn test_lower_bound_from_disjoint_children() {
        let mut bank = TermBank::new();
        let (mut lattice, dog_id, cat_id, animal_id) = animal_lattice(&mut bank);
        lattice.force_set_size(&mut bank, dog_id, 5).unwrap();
        lattice.force_set_size(&mut bank, cat_id, 7).unwrap();
        // animal must hold at least the two disjoint subsets
        let lower = lattice.size_lower_bound(&mut bank, animal_id).unwrap();
        assert!(lower >= 12);
    }

    #[test]
    fn test_upper_bound_from_ancestor() {
        let mut bank = TermBank::new();
        let (mut lattice, dog_id, cat_id, animal_id) = animal_lattice(&mut bank);
        lattice.force_set_size(&mut bank, animal_id, 10).unwrap();
        lattice.force_set_size(&mut bank, cat_id, 4).unwrap();
        let upper = lattice.size_upper_bound(&mut bank, dog_id).unwrap();
        assert!(upper <= 6);
    }

    #[test]
    fn test_set_size_checks_bounds() {
        let mut bank = TermBank::new();
        let (mut lattice, dog_id, cat_id, animal_id) = animal_lattice(&mut bank);
        lattice.force_set_size(&mut bank, dog_id, 5).unwrap();
        lattice.force_set_size(&mut bank, cat_id, 7).unwrap();
        let result = lattice.set_size(&mut bank, animal_id, 3);
        assert!(matches!(
            result,
            Err(LatticeError::BoundViolation { lower: 12, .. })
        ));
        assert!(lattice.set_size(&mut bank, animal_id, 20).is_ok());
    }

    #[test]
    fn test_remove_subset_collects_vertices() {
        let mut bank = TermBank::new();
        let mut lattice = SetLattice::new(&mut bank);
        let dog = atom(&mut bank, 1);
        let animal = atom(&mut bank, 3);
        lattice.add_subset(&mut bank, &dog, &animal).unwrap();
        let before = lattice.set_count();
        lattice.remove_subset(&mut bank, &dog, &animal).unwrap();
        assert!(lattice.set_count() < before);
    }

    #[test]
    fn test_unknown_formula_errors() {
        let mut bank = TermBank::new();
        let mut lattice = SetLattice::new(&mut bank);
        let dog = atom(&mut bank, 1);
        let animal = atom(&mut bank, 3);
        let result = lattice.remove_subset(&mut bank, &dog, &animal);
        assert!(matches!(result, Err(LatticeError::NoSuchSet)));
    }
}
