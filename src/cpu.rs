//! CPU identification.
//!
//! [`init`] must succeed before anything else runs: later code is allowed to
//! assume the feature set has been read.

use core::fmt;

use spin::Once;

/// One CPUID leaf.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Leaf {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// Feature bits from leaf 1.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    edx: u32,
    ecx: u32,
}

impl Features {
    pub const FPU: u32 = 1 << 0;
    pub const TSC: u32 = 1 << 4;
    pub const MSR: u32 = 1 << 5;
    pub const APIC: u32 = 1 << 9;
    pub const SSE: u32 = 1 << 25;
    pub const SSE2: u32 = 1 << 26;
    /// In ECX.
    pub const SSE3: u32 = 1 << 0;

    const NAMED: [(&'static str, u32); 6] = [
        ("fpu", Self::FPU),
        ("tsc", Self::TSC),
        ("msr", Self::MSR),
        ("apic", Self::APIC),
        ("sse", Self::SSE),
        ("sse2", Self::SSE2),
    ];

    pub const fn has(&self, edx_bit: u32) -> bool {
        self.edx & edx_bit != 0
    }

    pub const fn has_ecx(&self, ecx_bit: u32) -> bool {
        self.ecx & ecx_bit != 0
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, bit) in Self::NAMED {
            if self.has(bit) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if self.has_ecx(Self::SSE3) {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str("sse3")?;
        }
        Ok(())
    }
}

/// What CPUID told us at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuInfo {
    vendor: [u8; 12],
    pub max_leaf: u32,
    pub family: u32,
    pub model: u32,
    pub stepping: u32,
    pub features: Features,
}

impl CpuInfo {
    pub fn from_leaves(leaf0: Leaf, leaf1: Leaf) -> Self {
        let mut vendor = [0u8; 12];
        vendor[0..4].copy_from_slice(&leaf0.ebx.to_le_bytes());
        vendor[4..8].copy_from_slice(&leaf0.edx.to_le_bytes());
        vendor[8..12].copy_from_slice(&leaf0.ecx.to_le_bytes());

        let signature = leaf1.eax;
        let base_family = (signature >> 8) & 0xF;
        let base_model = (signature >> 4) & 0xF;
        let family = if base_family == 0xF {
            base_family + ((signature >> 20) & 0xFF)
        } else {
            base_family
        };
        let model = if base_family == 0x6 || base_family == 0xF {
            base_model | ((signature >> 16) & 0xF) << 4
        } else {
            base_model
        };

        Self {
            vendor,
            max_leaf: leaf0.eax,
            family,
            model,
            stepping: signature & 0xF,
            features: Features {
                edx: leaf1.edx,
                ecx: leaf1.ecx,
            },
        }
    }

    pub fn vendor(&self) -> &str {
        core::str::from_utf8(&self.vendor).unwrap_or("unknown")
    }
}

impl fmt::Display for CpuInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} family {} model {} stepping {} [{}]",
            self.vendor(),
            self.family,
            self.model,
            self.stepping,
            self.features
        )
    }
}

static CPU: Once<CpuInfo> = Once::new();

/// Probes the processor. Returns false if it can't be identified.
pub fn init() -> bool {
    if !cpuid_available() {
        log::error!("cpuid not supported");
        return false;
    }

    let leaf0 = cpuid(0);
    if leaf0.eax < 1 {
        log::error!("cpuid leaf 1 not available");
        return false;
    }

    CPU.call_once(|| CpuInfo::from_leaves(leaf0, cpuid(1)));
    true
}

/// Logs what [`init`] found.
pub fn dump() {
    match CPU.get() {
        Some(info) => {
            log::info!("cpu: {}", info);
            log::info!("cpu: max cpuid leaf {:#x}", info.max_leaf);
            log::info!("cpu: tsc {}", if has_tsc() { "yes" } else { "no" });
        }
        None => log::warn!("cpu: not identified"),
    }
}

/// What [`init`] found, if it has run successfully.
pub fn info() -> Option<&'static CpuInfo> {
    CPU.get()
}

pub fn has_tsc() -> bool {
    CPU.get().is_some_and(|info| info.features.has(Features::TSC))
}

#[cfg(target_arch = "x86")]
fn cpuid(leaf: u32) -> Leaf {
    #[allow(unused_unsafe)]
    let r = unsafe { core::arch::x86::__cpuid(leaf) };
    Leaf { eax: r.eax, ebx: r.ebx, ecx: r.ecx, edx: r.edx }
}

#[cfg(target_arch = "x86_64")]
fn cpuid(leaf: u32) -> Leaf {
    #[allow(unused_unsafe)]
    let r = unsafe { core::arch::x86_64::__cpuid(leaf) };
    Leaf { eax: r.eax, ebx: r.ebx, ecx: r.ecx, edx: r.edx }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn cpuid(_leaf: u32) -> Leaf {
    Leaf::default()
}

/// CPUID exists iff EFLAGS.ID (bit 21) can be toggled.
#[cfg(target_arch = "x86")]
fn cpuid_available() -> bool {
    let changed: u32;
    unsafe {
        core::arch::asm!(
            "pushfd",
            "pop {a}",
            "mov {b}, {a}",
            "xor {a}, 0x200000",
            "push {a}",
            "popfd",
            "pushfd",
            "pop {a}",
            "push {b}",
            "popfd",
            "xor {a}, {b}",
            a = out(reg) changed,
            b = out(reg) _,
        );
    }
    changed & (1 << 21) != 0
}

#[cfg(target_arch = "x86_64")]
fn cpuid_available() -> bool {
    true
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn cpuid_available() -> bool {
    false
}
