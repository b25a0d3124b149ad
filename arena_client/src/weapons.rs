//! Weapon registry and per-player arsenal.

use std::{collections::BTreeMap, fmt};

/// How a weapon delivers damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireMode {
    /// Instant ray from the eye.
    Hitscan,
    /// Rocket launched along the aim.
    Rocket,
    /// Rocket launched from the muzzle; reloads after every shot.
    MuzzleRocket,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponSpec {
    pub id: u8,
    pub name: &'static str,
    pub mode: FireMode,
    pub max_ammo: u32,
    /// Seconds between shots.
    pub cooldown: f32,
    pub reload_time: f32,
}

/// Weapon every player starts with.
pub const DEFAULT_WEAPON: u8 = 4;

/// Damage of one hitscan bullet.
pub const HITSCAN_DAMAGE: i32 = 1;

/// Rays start this far in front of the eye.
pub const RAY_OFFSET: f32 = 0.5;

pub const MAX_RANGE: f32 = 500.0;

static WEAPONS: [WeaponSpec; 4] = [
    WeaponSpec {
        id: 1,
        name: "pistol",
        mode: FireMode::Hitscan,
        max_ammo: 12,
        cooldown: 0.3,
        reload_time: 1.5,
    },
    WeaponSpec {
        id: 2,
        name: "rifle",
        mode: FireMode::Hitscan,
        max_ammo: 30,
        cooldown: 0.1,
        reload_time: 2.0,
    },
    WeaponSpec {
        id: 3,
        name: "bazooka",
        mode: FireMode::Rocket,
        max_ammo: 3,
        cooldown: 1.0,
        reload_time: 3.0,
    },
    WeaponSpec {
        id: 4,
        name: "fireball",
        mode: FireMode::MuzzleRocket,
        max_ammo: 1,
        cooldown: 0.0,
        reload_time: 1.2,
    },
];

/// Looks up a registered weapon.
pub fn weapon_spec(id: u8) -> Option<&'static WeaponSpec> {
    WEAPONS.iter().find(|w| w.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponError {
    Unregistered(u8),
}

impl fmt::Display for WeaponError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeaponError::Unregistered(id) => write!(f, "weapon {} is not registered", id),
        }
    }
}

impl std::error::Error for WeaponError {}

/// Outcome of a trigger pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireResult {
    Fired(FireMode),
    /// Magazine was empty; a reload started instead.
    Reloading,
    /// Cooling down or mid-reload.
    Blocked,
}

/// Current weapon, its ammo, and ammo stashed for the others.
#[derive(Debug, Clone)]
pub struct Arsenal {
    spec: &'static WeaponSpec,
    ammo: u32,
    stored: BTreeMap<u8, u32>,
    can_fire: bool,
    cooldown: f32,
    reloading: bool,
}

impl Default for Arsenal {
    /// Starts with the fireball.
    fn default() -> Self {
        Self::with_spec(&WEAPONS[3])
    }
}

impl Arsenal {
    pub fn new(initial: u8) -> Result<Self, WeaponError> {
        let spec = weapon_spec(initial).ok_or(WeaponError::Unregistered(initial))?;
        Ok(Self::with_spec(spec))
    }

    fn with_spec(spec: &'static WeaponSpec) -> Self {
        Self {
            spec,
            ammo: spec.max_ammo,
            stored: BTreeMap::new(),
            can_fire: true,
            cooldown: 0.0,
            reloading: false,
        }
    }

    pub fn current(&self) -> &'static WeaponSpec {
        self.spec
    }

    pub fn ammo(&self) -> u32 {
        self.ammo
    }

    pub fn is_reloading(&self) -> bool {
        self.reloading
    }

    /// Switches weapons. Returns `Ok(false)` when `id` is already equipped.
    pub fn set_weapon(&mut self, id: u8) -> Result<bool, WeaponError> {
        if id == self.spec.id {
            return Ok(false);
        }
        let spec = weapon_spec(id).ok_or(WeaponError::Unregistered(id))?;
        self.stored.insert(self.spec.id, self.ammo);
        self.spec = spec;
        self.ammo = self.stored.get(&id).copied().unwrap_or(spec.max_ammo);
        self.reloading = false;
        Ok(true)
    }

    /// Advances cooldowns. Returns `true` when a reload completed.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.can_fire {
            return false;
        }
        self.cooldown -= dt;
        if self.cooldown > 0.0 {
            return false;
        }
        self.can_fire = true;
        if self.reloading {
            self.reloading = false;
            self.ammo = self.spec.max_ammo;
            return true;
        }
        false
    }

    /// Starts a reload unless cooling down. Drops the current magazine.
    pub fn reload(&mut self) -> bool {
        if !self.can_fire {
            return false;
        }
        self.reloading = true;
        self.can_fire = false;
        self.cooldown = self.spec.reload_time;
        self.ammo = 0;
        true
    }

    pub fn fire(&mut self) -> FireResult {
        if !self.can_fire {
            return FireResult::Blocked;
        }
        if self.ammo == 0 {
            self.reload();
            return FireResult::Reloading;
        }
        self.ammo -= 1;
        self.can_fire = false;
        self.cooldown = self.spec.cooldown;
        if self.spec.mode == FireMode::MuzzleRocket {
            // The reload that follows is announced to every peer.
            self.can_fire = true;
        }
        FireResult::Fired(self.spec.mode)
    }

    /// Bullets bonus.
    pub fn refill(&mut self) {
        self.ammo = self.spec.max_ammo;
    }
}
