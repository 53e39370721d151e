// src/constants.rs

/// Windows shell process. It respawns on its own after being killed.
pub const SHELL_PROCESS_NAME: &str = "explorer";

/// Alias accepted by the power APIs for whichever scheme is currently active.
pub const ACTIVE_SCHEME_ALIAS: &str = "SCHEME_CURRENT";

/// Raw value field that carries the active power plan GUID for plan selections.
pub const ACTIVE_POWER_PLAN_FIELD: &str = "ActivePowerPlanGuid";

// Explorer respawn polling defaults.
pub const EXPLORER_RESTART_ATTEMPTS: u32 = 10;
pub const EXPLORER_RESTART_DELAY_MS: u64 = 500;

/// Registry subtrees that can never be deleted wholesale.
pub const PROTECTED_REGISTRY_ROOTS: &[&str] = &[
    r"SOFTWARE\Microsoft\Windows",
    r"SOFTWARE\Microsoft\Windows NT",
    r"SOFTWARE\Microsoft",
    r"SOFTWARE\Policies",
    r"SOFTWARE\Classes",
    r"SYSTEM\CurrentControlSet",
    r"SYSTEM\CurrentControlSet\Control",
    r"SYSTEM\CurrentControlSet\Services",
];

/// Minimum number of subkey levels (below the hive) a key must have before it may be deleted.
pub const MIN_DELETABLE_KEY_DEPTH: usize = 3;

/// A power plan that ships with Windows, identified by its well-known GUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PredefinedPowerPlan {
    pub name: &'static str,
    pub guid: &'static str,
}

pub const BALANCED_PLAN: PredefinedPowerPlan = PredefinedPowerPlan {
    name: "Balanced",
    guid: "381b4222-f694-41f0-9685-ff5bb260df2e",
};

pub const HIGH_PERFORMANCE_PLAN: PredefinedPowerPlan = PredefinedPowerPlan {
    name: "High performance",
    guid: "8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c",
};

pub const POWER_SAVER_PLAN: PredefinedPowerPlan = PredefinedPowerPlan {
    name: "Power saver",
    guid: "a1841308-3541-4fab-bc81-f71556f20b4a",
};

pub const ULTIMATE_PERFORMANCE_PLAN: PredefinedPowerPlan = PredefinedPowerPlan {
    name: "Ultimate Performance",
    guid: "e9a42b02-d5df-448d-aa00-03f14749eb61",
};

pub const PREDEFINED_POWER_PLANS: [PredefinedPowerPlan; 4] = [
    BALANCED_PLAN,
    HIGH_PERFORMANCE_PLAN,
    POWER_SAVER_PLAN,
    ULTIMATE_PERFORMANCE_PLAN,
];
