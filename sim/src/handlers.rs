//! Input handlers.
//!
//! Human and computer players feed the mission the same way: once per
//! running tick each handler looks at the live instructions and a snapshot
//! and returns new instructions to assign.

use crate::components::{Faction, WeaponClass};
use crate::systems::instruction::{Instruction, InstructionSet};
use crate::world::Snapshot;

pub trait InputHandler: Send + Sync {
    fn handle(&mut self, current: &InstructionSet, state: &Snapshot) -> Vec<Instruction>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GroupOrder {
    Move { x: f32, y: f32 },
    Route { x: f32, y: f32 },
    Weapons { class: WeaponClass, enabled: bool },
}

impl GroupOrder {
    fn for_ship(self, uid: &str) -> Instruction {
        match self {
            GroupOrder::Move { x, y } => Instruction::move_to(uid, x, y),
            GroupOrder::Route { x, y } => Instruction::move_along_path(uid, x, y),
            GroupOrder::Weapons { class, enabled: true } => Instruction::enable_weapon(uid, class),
            GroupOrder::Weapons { class, enabled: false } => Instruction::disable_weapon(uid, class),
        }
    }
}

/// Orders issued by a UI layer, buffered until the next running tick.
#[derive(Debug, Clone)]
pub struct HumanHandler {
    faction: Faction,
    pending: Vec<Instruction>,
    group_orders: Vec<(u8, GroupOrder)>,
}

impl HumanHandler {
    pub fn new(faction: Faction) -> Self {
        Self {
            faction,
            pending: Vec::new(),
            group_orders: Vec::new(),
        }
    }

    pub fn faction(&self) -> Faction {
        self.faction
    }

    pub fn order(&mut self, instruction: Instruction) {
        self.pending.push(instruction);
    }

    pub fn order_move(&mut self, ship: &str, x: f32, y: f32) {
        self.order(Instruction::move_to(ship, x, y));
    }

    pub fn order_route(&mut self, ship: &str, x: f32, y: f32) {
        self.order(Instruction::move_along_path(ship, x, y));
    }

    pub fn order_weapons(&mut self, ship: &str, class: WeaponClass, enabled: bool) {
        self.order(GroupOrder::Weapons { class, enabled }.for_ship(ship));
    }

    pub fn order_summon(&mut self, point: &str, ship: &str) {
        self.order(Instruction::summon(point, ship));
    }

    pub fn order_group_move(&mut self, group: u8, x: f32, y: f32) {
        self.group_orders.push((group, GroupOrder::Move { x, y }));
    }

    pub fn order_group_route(&mut self, group: u8, x: f32, y: f32) {
        self.group_orders.push((group, GroupOrder::Route { x, y }));
    }

    pub fn order_group_weapons(&mut self, group: u8, class: WeaponClass, enabled: bool) {
        self.group_orders.push((group, GroupOrder::Weapons { class, enabled }));
    }

    /// Orders waiting for the next tick, group orders counted once.
    pub fn pending(&self) -> usize {
        self.pending.len() + self.group_orders.len()
    }
}

impl InputHandler for HumanHandler {
    fn handle(&mut self, _current: &InstructionSet, state: &Snapshot) -> Vec<Instruction> {
        let mut out = std::mem::take(&mut self.pending);
        for (group, order) in std::mem::take(&mut self.group_orders) {
            out.extend(
                state
                    .live_ships()
                    .filter(|s| s.faction == self.faction.0 && s.group == Some(group))
                    .map(|s| order.for_ship(&s.uid)),
            );
        }
        out
    }
}
