//! Two-phase batch engine.
//!
//! [`plan_batch`] validates a whole batch against a snapshot of the referenced
//! containers and ships and computes every resulting document in memory. It
//! never performs IO; the caller commits the returned [`TransferPlan`] in one
//! step, so a batch either takes effect completely or not at all.
//!
//! Validation order:
//! 1. every referenced blueprint resolves and has a volume;
//! 2. record shape (non-zero quantities, ship moves are `±1` of the ship's own blueprint);
//! 3. ownership of every container not created by the batch;
//! 4. ship docking state, simulated in batch order;
//! 5. balance per key (skipped for privileged callers).
//!
//! Mutations are then applied to working copies: lifecycle records first,
//! transfers after, re-checking capacity on each record.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use spacedock_core::{
    AccountId, BlueprintId, ContainerId, InventoryError, InventoryResult, Owned, ShipId, SliceId,
};

use crate::batch::{BatchRecord, ContainerAction, TransferRecord};
use crate::blueprint::Blueprint;
use crate::container::Container;
use crate::ship::{Ship, ShipState};

/// Snapshot a batch is planned against.
///
/// `containers` must hold every container the batch touches that exists
/// (tombstoned ones included); `ships` every ship moved by the batch, any
/// ship whose companion container the batch touches, and the ships those
/// companions are docked in, transitively.
#[derive(Debug, Clone, Copy)]
pub struct BatchContext<'a> {
    pub account: AccountId,
    pub privileged: bool,
    pub blueprints: &'a BTreeMap<BlueprintId, Blueprint>,
    pub containers: &'a BTreeMap<ContainerId, Container>,
    pub ships: &'a BTreeMap<ShipId, Ship>,
}

impl<'a> BatchContext<'a> {
    fn blueprint(&self, id: &BlueprintId) -> InventoryResult<&'a Blueprint> {
        let bp = self
            .blueprints
            .get(id)
            .ok_or_else(|| InventoryError::InvalidBlueprint(id.clone()))?;
        bp.unit_volume()?;
        Ok(bp)
    }

    fn ship_state<'s>(
        &'s self,
        simulated: &'s BTreeMap<ShipId, ShipState>,
        id: ShipId,
    ) -> Option<&'s ShipState> {
        simulated
            .get(&id)
            .or_else(|| self.ships.get(&id).map(|s| &s.state))
    }
}

/// Documents to write for a validated batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferPlan {
    /// New containers (must not exist yet).
    pub created: Vec<Container>,
    /// Changed existing containers, carrying the version they were read at.
    pub updated: Vec<Container>,
    /// Ships whose state changed.
    pub ships: Vec<Ship>,
}

impl TransferPlan {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.ships.is_empty()
    }
}

/// Validate a batch and compute its effects.
pub fn plan_batch(records: &[BatchRecord], ctx: &BatchContext<'_>) -> InventoryResult<TransferPlan> {
    for record in records {
        ctx.blueprint(record.blueprint())?;
    }
    check_shapes(records, ctx)?;
    let created = check_ownership(records, ctx)?;
    let ship_states = simulate_ships(records, ctx)?;
    if !ctx.privileged {
        check_balance(records)?;
    }
    apply(records, ctx, &created, ship_states)
}

fn check_shapes(records: &[BatchRecord], ctx: &BatchContext<'_>) -> InventoryResult<()> {
    for record in records {
        match record {
            BatchRecord::Container(c) => {
                if ctx.ships.contains_key(&ShipId::from(c.container)) {
                    return Err(InventoryError::invalid_transfer(format!(
                        "container {} belongs to a ship",
                        c.container
                    )));
                }
            }
            BatchRecord::Transfer(t) => match t.ship {
                None if t.quantity == 0 => {
                    return Err(InventoryError::invalid_transfer(format!(
                        "zero quantity of {} for container {}",
                        t.blueprint, t.inventory
                    )));
                }
                None => {}
                Some(ship_id) => check_ship_record(t, ship_id, ctx)?,
            },
        }
    }
    Ok(())
}

fn check_ship_record(t: &TransferRecord, ship_id: ShipId, ctx: &BatchContext<'_>) -> InventoryResult<()> {
    if !ctx.blueprint(&t.blueprint)?.is_ship() {
        return Err(InventoryError::invalid_transfer(format!(
            "blueprint {} is not a ship",
            t.blueprint
        )));
    }
    if !matches!(t.quantity, 1 | -1) {
        return Err(InventoryError::invalid_transfer(format!(
            "ship {ship_id} moves by exactly one, got {}",
            t.quantity
        )));
    }
    let ship = ctx
        .ships
        .get(&ship_id)
        .ok_or_else(|| InventoryError::not_found(format!("ship {ship_id}")))?;
    if !ship.is_owned_by(ctx.account) {
        return Err(InventoryError::Unauthorized);
    }
    if ship.blueprint != t.blueprint {
        return Err(InventoryError::invalid_transfer(format!(
            "ship {ship_id} is a {}, not a {}",
            ship.blueprint, t.blueprint
        )));
    }
    if ship.companion() == t.inventory {
        return Err(InventoryError::invalid_transfer(format!(
            "ship {ship_id} cannot dock inside itself"
        )));
    }
    Ok(())
}

/// Returns the ids created by the batch.
fn check_ownership(
    records: &[BatchRecord],
    ctx: &BatchContext<'_>,
) -> InventoryResult<BTreeSet<ContainerId>> {
    let mut created = BTreeSet::new();
    for record in records {
        if let BatchRecord::Container(c) = record {
            if c.action == ContainerAction::Create
                && (ctx.containers.contains_key(&c.container) || !created.insert(c.container))
            {
                return Err(InventoryError::conflict(format!(
                    "container {} already exists",
                    c.container
                )));
            }
        }
    }

    for record in records {
        let id = record.container();
        if created.contains(&id) {
            continue;
        }
        let container = ctx
            .containers
            .get(&id)
            .filter(|c| !c.tombstoned)
            .ok_or_else(|| InventoryError::not_found(format!("container {id}")))?;
        if !container.is_owned_by(ctx.account) {
            return Err(InventoryError::Unauthorized);
        }
    }
    Ok(created)
}

/// Walk ship records in order and return each moved ship's final state.
fn simulate_ships(
    records: &[BatchRecord],
    ctx: &BatchContext<'_>,
) -> InventoryResult<BTreeMap<ShipId, ShipState>> {
    let mut states: BTreeMap<ShipId, ShipState> = BTreeMap::new();
    for record in records {
        let BatchRecord::Transfer(t) = record else {
            continue;
        };
        match t.ship {
            Some(ship) if t.quantity < 0 => {
                let present = ctx
                    .ship_state(&states, ship)
                    .is_some_and(|s| s.is_docked_at(t.inventory, &t.slice));
                if !present {
                    return Err(InventoryError::ShipNotPresent(ship));
                }
                states.insert(ship, ShipState::InSpace);
            }
            Some(ship) => {
                let in_space = ctx.ship_state(&states, ship).is_some_and(ShipState::is_in_space);
                if !in_space {
                    return Err(InventoryError::ShipInSpaceConflict(ship));
                }
                if carries(ctx, &states, ship, t.inventory) {
                    return Err(InventoryError::invalid_transfer(format!(
                        "ship {ship} cannot dock inside a ship it carries"
                    )));
                }
                states.insert(
                    ship,
                    ShipState::Docked {
                        container: t.inventory,
                        slice: t.slice.clone(),
                    },
                );
            }
            None if !ctx.privileged => {
                let owner = ShipId::from(t.inventory);
                if ctx.ship_state(&states, owner).is_some_and(ShipState::is_in_space) {
                    return Err(InventoryError::ShipInSpaceConflict(owner));
                }
            }
            None => {}
        }
    }
    Ok(states)
}

/// Whether `container` sits, at any depth, inside `ship`'s companion container.
///
/// Follows the chain of ships hosting `container`. A chain longer than the
/// number of known ships is already cyclic elsewhere and is not blamed on `ship`.
fn carries(
    ctx: &BatchContext<'_>,
    states: &BTreeMap<ShipId, ShipState>,
    ship: ShipId,
    container: ContainerId,
) -> bool {
    let mut current = container;
    for _ in 0..=ctx.ships.len() + states.len() {
        let host = ShipId::from(current);
        if host == ship {
            return true;
        }
        match ctx.ship_state(states, host) {
            Some(ShipState::Docked { container, .. }) => current = *container,
            _ => return false,
        }
    }
    false
}

fn check_balance(records: &[BatchRecord]) -> InventoryResult<()> {
    let mut sums: BTreeMap<String, i64> = BTreeMap::new();
    for record in records {
        let (key, delta) = match record {
            BatchRecord::Container(c) => (
                c.blueprint.to_string(),
                match c.action {
                    ContainerAction::Create => 1,
                    ContainerAction::Destroy => -1,
                },
            ),
            BatchRecord::Transfer(t) => (t.balance_key(), t.quantity),
        };
        let sum = sums.entry(key).or_default();
        *sum = sum
            .checked_add(delta)
            .ok_or_else(|| InventoryError::invalid_transfer("quantity overflow"))?;
    }
    match sums.into_iter().find(|(_, sum)| *sum != 0) {
        Some((key, _)) => Err(InventoryError::Unbalanced(key)),
        None => Ok(()),
    }
}

fn checkout<'w>(
    working: &'w mut BTreeMap<ContainerId, Container>,
    ctx: &BatchContext<'_>,
    id: ContainerId,
) -> InventoryResult<&'w mut Container> {
    match working.entry(id) {
        Entry::Occupied(e) => Ok(e.into_mut()),
        Entry::Vacant(e) => {
            let original = ctx
                .containers
                .get(&id)
                .ok_or_else(|| InventoryError::not_found(format!("container {id}")))?;
            Ok(e.insert(original.clone()))
        }
    }
}

fn apply(
    records: &[BatchRecord],
    ctx: &BatchContext<'_>,
    created: &BTreeSet<ContainerId>,
    ship_states: BTreeMap<ShipId, ShipState>,
) -> InventoryResult<TransferPlan> {
    let mut working: BTreeMap<ContainerId, Container> = BTreeMap::new();

    for record in records {
        let BatchRecord::Container(c) = record else {
            continue;
        };
        let bp = ctx.blueprint(&c.blueprint)?;
        match c.action {
            ContainerAction::Create => {
                working.insert(
                    c.container,
                    Container::from_blueprint(c.container, ctx.account, bp),
                );
            }
            ContainerAction::Destroy => {
                let container = checkout(&mut working, ctx, c.container)?;
                if container.tombstoned {
                    return Err(InventoryError::not_found(format!("container {}", c.container)));
                }
                if container.blueprint != c.blueprint {
                    return Err(InventoryError::InvalidBlueprint(c.blueprint.clone()));
                }
                if !container.is_empty() {
                    return Err(InventoryError::ContainerNotEmpty(c.container));
                }
                container.tombstoned = true;
            }
        }
    }

    for record in records {
        let BatchRecord::Transfer(t) = record else {
            continue;
        };
        let bp = ctx.blueprint(&t.blueprint)?;
        let container = checkout(&mut working, ctx, t.inventory)?;
        match t.ship {
            Some(ship) if t.quantity < 0 => container.undock_ship(&t.slice, ship, bp)?,
            Some(ship) => container.dock_ship(&t.slice, ship, bp)?,
            None => container.adjust_stock(&t.slice, bp, t.quantity)?,
        }
    }

    let mut plan = TransferPlan::default();
    for (id, container) in working {
        if created.contains(&id) {
            plan.created.push(container);
        } else if ctx.containers.get(&id) != Some(&container) {
            plan.updated.push(container);
        }
    }
    for (id, state) in ship_states {
        if let Some(ship) = ctx.ships.get(&id).filter(|s| s.state != state) {
            let mut moved = ship.clone();
            moved.state = state;
            plan.ships.push(moved);
        }
    }
    Ok(plan)
}

/// Documents produced by unpacking one ship.
#[derive(Debug, Clone, PartialEq)]
pub struct UnpackPlan {
    /// Hangar container with one packed unit turned into `ship`.
    pub container: Container,
    pub ship: Ship,
    /// The ship's own (empty) container.
    pub companion: Container,
}

/// Unpack one packed ship of `blueprint` from a hangar slice.
pub fn plan_unpack(
    container: &Container,
    slice: &SliceId,
    blueprint: &Blueprint,
    account: AccountId,
    ship_id: ShipId,
) -> InventoryResult<UnpackPlan> {
    if container.tombstoned {
        return Err(InventoryError::not_found(format!("container {}", container.id)));
    }
    if !container.is_owned_by(account) {
        return Err(InventoryError::Unauthorized);
    }
    if !blueprint.is_ship() {
        return Err(InventoryError::InvalidBlueprint(blueprint.id.clone()));
    }
    blueprint.unit_volume()?;

    let mut updated = container.clone();
    updated.unpack_ship(slice, blueprint, ship_id)?;
    let ship = Ship::docked(
        ship_id,
        account,
        blueprint.id.clone(),
        container.id,
        slice.clone(),
    );
    let companion = Container::from_blueprint(ship.companion(), account, blueprint);
    Ok(UnpackPlan {
        container: updated,
        ship,
        companion,
    })
}
