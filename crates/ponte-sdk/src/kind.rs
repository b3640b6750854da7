//! Member kinds and lifecycle hooks

use std::fmt;

/// Kind of a type member, passed across the boundary as `i32`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Instance field
    Field = 0,
    /// Property with getter and/or setter
    Property = 1,
    /// Method (instance or static)
    Method = 2,
    /// Constructor
    Constructor = 3,
}

impl MemberKind {
    /// Decode a raw discriminant received from native code
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(MemberKind::Field),
            1 => Some(MemberKind::Property),
            2 => Some(MemberKind::Method),
            3 => Some(MemberKind::Constructor),
            _ => None,
        }
    }

    /// Raw discriminant
    pub const fn to_raw(self) -> i32 {
        self as i32
    }

    /// Fields and properties carry a value
    pub const fn is_value(self) -> bool {
        matches!(self, MemberKind::Field | MemberKind::Property)
    }

    /// Lowercase name for diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            MemberKind::Field => "field",
            MemberKind::Property => "property",
            MemberKind::Method => "method",
            MemberKind::Constructor => "constructor",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-instance lifecycle events forwarded from a proxy to its native instance.
///
/// Construction and destruction of the native instance itself go through the
/// `CreateInstance`/`DestroyInstance` exports; these hooks cover everything
/// in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    /// Right after the native instance was created
    Awake,
    /// Before the first tick the instance takes part in
    Start,
    /// During teardown of a started instance
    Stop,
    /// Proxy became enabled
    Enable,
    /// Proxy became disabled
    Disable,
    /// Fixed-rate tick
    FixedTick,
    /// Per-frame tick
    Tick,
    /// Per-frame tick after every `Tick`
    LateTick,
    /// Last hook before `DestroyInstance`
    Destroy,
}

impl LifecycleHook {
    /// Every hook, in the order their exports are resolved
    pub const ALL: [LifecycleHook; 9] = [
        LifecycleHook::Awake,
        LifecycleHook::Start,
        LifecycleHook::Stop,
        LifecycleHook::Enable,
        LifecycleHook::Disable,
        LifecycleHook::FixedTick,
        LifecycleHook::Tick,
        LifecycleHook::LateTick,
        LifecycleHook::Destroy,
    ];

    /// Name of the native export implementing this hook
    pub const fn export_name(self) -> &'static str {
        match self {
            LifecycleHook::Awake => "CallAwake",
            LifecycleHook::Start => "CallStart",
            LifecycleHook::Stop => "CallStop",
            LifecycleHook::Enable => "CallEnable",
            LifecycleHook::Disable => "CallDisable",
            LifecycleHook::FixedTick => "CallFixedTick",
            LifecycleHook::Tick => "CallTick",
            LifecycleHook::LateTick => "CallLateTick",
            LifecycleHook::Destroy => "CallDestroy",
        }
    }

    /// Dense index, matching the position in [`LifecycleHook::ALL`]
    pub const fn index(self) -> usize {
        match self {
            LifecycleHook::Awake => 0,
            LifecycleHook::Start => 1,
            LifecycleHook::Stop => 2,
            LifecycleHook::Enable => 3,
            LifecycleHook::Disable => 4,
            LifecycleHook::FixedTick => 5,
            LifecycleHook::Tick => 6,
            LifecycleHook::LateTick => 7,
            LifecycleHook::Destroy => 8,
        }
    }
}
