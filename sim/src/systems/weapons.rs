//! Weapon state machines.
//!
//! Each mounted weapon cools down every tick and fires on its own when the
//! owner has a target: guns fire a salvo per reload, torpedo launchers
//! fire a spaced cycle of torpedoes per reload, and releasers drop a
//! pattern of charges around the aim point.

use crate::components::*;
use crate::config::CombatConfig;
use crate::geometry::{bearing, distance, in_firing_arcs, lead_aim_point};
use crate::systems::ballistics::{classify, launch};
use rand::Rng;

/// What a weapon is being asked to shoot at.
#[derive(Debug, Clone, Copy)]
pub struct Engagement<'a> {
    pub shooter: &'a str,
    pub faction: Faction,
    pub origin: (f32, f32),
    pub hull_heading: f32,
    pub target: (f32, f32),
    /// Target displacement per tick.
    pub target_velocity: (f32, f32),
}

fn scatter<R: Rng>(aim: (f32, f32), radius: f32, rng: &mut R) -> (f32, f32) {
    if radius <= 0.0 {
        return aim;
    }
    (
        aim.0 + rng.gen_range(-1.0f32..=1.0) * radius,
        aim.1 + rng.gen_range(-1.0f32..=1.0) * radius,
    )
}

impl Weapon {
    /// One tick of reload.
    pub fn cool_down(&mut self) {
        self.reload_left = self.reload_left.saturating_sub(1);
        self.shot_cooldown = self.shot_cooldown.saturating_sub(1);
    }

    /// Whether the weapon may fire this tick, ignoring geometry.
    pub fn is_ready(&self) -> bool {
        self.enabled && self.reload_left == 0 && self.shot_cooldown == 0
    }

    /// Fire at the engagement if every gate passes. Returns the rounds
    /// launched (empty when the weapon holds fire).
    pub fn try_fire<R: Rng>(
        &mut self,
        engagement: &Engagement<'_>,
        combat: &CombatConfig,
        rng: &mut R,
    ) -> Vec<Bullet> {
        if !self.is_ready() {
            return Vec::new();
        }
        let origin = engagement.origin;
        let range = self.range();
        if distance(origin.0, origin.1, engagement.target.0, engagement.target.1) > range {
            return Vec::new();
        }

        let aim = lead_aim_point(
            origin,
            self.bullet.speed,
            engagement.target,
            engagement.target_velocity,
        );
        let aim_bearing = bearing(origin.0, origin.1, aim.0, aim.1);
        if !in_firing_arcs(&self.arcs(), engagement.hull_heading, aim_bearing) {
            return Vec::new();
        }
        let ratio = if range > 0.0 {
            (distance(origin.0, origin.1, aim.0, aim.1) / range).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let slack = combat.direct_life_slack;
        match &self.spec {
            WeaponSpec::Gun(gun) => {
                let mode = classify(self.bullet.kind, gun.calibre, ratio, combat);
                self.reload_left = gun.reload_ticks;
                (0..gun.barrels)
                    .map(|_| {
                        let point = scatter(aim, gun.spread * ratio, rng);
                        launch(&self.bullet, mode, engagement.faction, engagement.shooter, origin, point, slack)
                    })
                    .collect()
            }
            WeaponSpec::Torpedo(tube) => {
                self.shot_cooldown = tube.shot_interval;
                self.salvo_fired += 1;
                if self.salvo_fired >= tube.shots_per_cycle {
                    self.salvo_fired = 0;
                    self.reload_left = tube.reload_ticks;
                }
                vec![launch(
                    &self.bullet,
                    FireMode::Direct,
                    engagement.faction,
                    engagement.shooter,
                    origin,
                    aim,
                    slack,
                )]
            }
            WeaponSpec::Releaser(rack) => {
                self.reload_left = rack.reload_ticks;
                (0..rack.release_count)
                    .map(|_| {
                        let point = scatter(aim, rack.spread * ratio, rng);
                        launch(
                            &self.bullet,
                            FireMode::Arcing,
                            engagement.faction,
                            engagement.shooter,
                            origin,
                            point,
                            slack,
                        )
                    })
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BulletKind, BulletTemplate, GunTemplate, ReleaserTemplate, TorpedoTemplate};
    use crate::geometry::FiringArc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn round(kind: BulletKind) -> Arc<BulletTemplate> {
        Arc::new(BulletTemplate {
            name: "r".into(),
            kind,
            damage: 10.0,
            speed: 1.0,
            width: 0.2,
        })
    }

    fn gun(arcs: [FiringArc; 2]) -> Weapon {
        Weapon::new(
            WeaponSpec::Gun(Arc::new(GunTemplate {
                name: "g".into(),
                bullet: "r".into(),
                range: 20.0,
                reload_ticks: 5,
                spread: 1.0,
                barrels: 3,
                calibre: 127.0,
                arcs,
            })),
            round(BulletKind::Shell),
        )
    }

    fn tube() -> Weapon {
        Weapon::new(
            WeaponSpec::Torpedo(Arc::new(TorpedoTemplate {
                name: "t".into(),
                bullet: "r".into(),
                range: 20.0,
                reload_ticks: 10,
                shots_per_cycle: 2,
                shot_interval: 3,
                arcs: [FiringArc::FULL, FiringArc::FULL],
            })),
            round(BulletKind::Torpedo),
        )
    }

    fn engagement(target: (f32, f32)) -> Engagement<'static> {
        Engagement {
            shooter: "blue#1",
            faction: Faction::BLUE,
            origin: (0.0, 0.0),
            hull_heading: 0.0,
            target,
            target_velocity: (0.0, 0.0),
        }
    }

    /// Tick `weapon` `ticks` times, returning the ticks it fired on.
    fn fire_pattern(weapon: &mut Weapon, target: (f32, f32), ticks: u32) -> Vec<u32> {
        let combat = CombatConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut fired = Vec::new();
        for tick in 0..ticks {
            weapon.cool_down();
            if !weapon.try_fire(&engagement(target), &combat, &mut rng).is_empty() {
                fired.push(tick);
            }
        }
        fired
    }

    #[test]
    fn test_gun_salvo_per_reload() {
        let mut weapon = gun([FiringArc::FULL, FiringArc::FULL]);
        let combat = CombatConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let salvo = weapon.try_fire(&engagement((5.0, 0.0)), &combat, &mut rng);
        assert_eq!(salvo.len(), 3);
        assert!(salvo.iter().all(|b| b.mode == FireMode::Direct));

        let mut weapon = gun([FiringArc::FULL, FiringArc::FULL]);
        assert_eq!(fire_pattern(&mut weapon, (5.0, 0.0), 12), vec![0, 5, 10]);
    }

    #[test]
    fn test_long_shot_is_lobbed() {
        let mut weapon = gun([FiringArc::FULL, FiringArc::FULL]);
        let combat = CombatConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let salvo = weapon.try_fire(&engagement((18.0, 0.0)), &combat, &mut rng);
        assert!(salvo.iter().all(|b| b.mode == FireMode::Arcing));
    }

    #[test]
    fn test_out_of_range_or_arc_holds_fire() {
        let mut weapon = gun([FiringArc::FULL, FiringArc::FULL]);
        assert!(fire_pattern(&mut weapon, (25.0, 0.0), 10).is_empty());

        // Forward arc only; target astern (south is +y).
        let mut weapon = gun([FiringArc::new(300.0, 60.0), FiringArc::new(300.0, 60.0)]);
        assert!(fire_pattern(&mut weapon, (0.0, 10.0), 10).is_empty());
        assert_eq!(fire_pattern(&mut weapon, (0.0, -10.0), 1), vec![0]);
    }

    #[test]
    fn test_disabled_weapon_holds_fire() {
        let mut weapon = gun([FiringArc::FULL, FiringArc::FULL]);
        weapon.enabled = false;
        assert!(fire_pattern(&mut weapon, (5.0, 0.0), 10).is_empty());
    }

    #[test]
    fn test_torpedo_cycle_spacing() {
        let mut weapon = tube();
        // Two torpedoes three ticks apart, then a ten tick reload.
        assert_eq!(fire_pattern(&mut weapon, (5.0, 0.0), 20), vec![0, 3, 13, 16]);
    }

    #[test]
    fn test_releaser_drops_arcing_charges_anywhere() {
        let mut weapon = Weapon::new(
            WeaponSpec::Releaser(Arc::new(ReleaserTemplate {
                name: "dc".into(),
                bullet: "r".into(),
                range: 6.0,
                reload_ticks: 30,
                release_count: 2,
                spread: 1.0,
            })),
            round(BulletKind::Bomb),
        );
        let combat = CombatConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        let charges = weapon.try_fire(&engagement((0.0, 4.0)), &combat, &mut rng);
        assert_eq!(charges.len(), 2);
        assert!(charges.iter().all(|b| b.mode == FireMode::Arcing));
        assert_eq!(weapon.reload_left, 30);
    }

    #[test]
    fn test_leads_moving_target() {
        let mut weapon = tube();
        let combat = CombatConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut e = engagement((10.0, 0.0));
        e.target_velocity = (0.0, 0.5);
        let torpedo = weapon.try_fire(&e, &combat, &mut rng).remove(0);
        // Aimed south of the target's current position.
        assert!(torpedo.target_y > 0.0);
        assert!(torpedo.heading > 90.0 && torpedo.heading < 180.0);
    }
}
