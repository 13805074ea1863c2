//! UEP/EEP protection-profile tables (ETSI EN 300 401 Table 7/8), reused
//! from the reference decoder's FIG 0/1 parsing tables for the mirror-image
//! problem: deriving a sub-channel's size-in-CU and TPL encoding from its
//! configured bitrate and protection level instead of parsing them back out.

/// UEP table index -> sub-channel size in Capacity Units.
pub const UEP_SIZES: [usize; 64] = [
    16, 21, 24, 29, 35, 24, 29, 35, 42, 52, 29, 35, 42, 52, 32, 42, 48, 58, 70, 40, 52, 58, 70, 84,
    48, 58, 70, 84, 104, 58, 70, 84, 104, 64, 84, 96, 116, 140, 80, 104, 116, 140, 168, 96, 116,
    140, 168, 208, 116, 140, 168, 208, 232, 128, 168, 192, 232, 280, 160, 208, 280, 192, 280, 416,
];

/// UEP table index -> protection level (1-5).
pub const UEP_PLS: [u8; 64] = [
    5, 4, 3, 2, 1, 5, 4, 3, 2, 1, 5, 4, 3, 2, 5, 4, 3, 2, 1, 5, 4, 3, 2, 1, 5, 4, 3, 2, 1, 5, 4, 3,
    2, 5, 4, 3, 2, 1, 5, 4, 3, 2, 1, 5, 4, 3, 2, 1, 5, 4, 3, 2, 1, 5, 4, 3, 2, 1, 5, 4, 2, 5, 3, 1,
];

/// UEP table index -> bitrate in kbps.
pub const UEP_BITRATES: [usize; 64] = [
    32, 32, 32, 32, 32, 48, 48, 48, 48, 48, 56, 56, 56, 56, 64, 64, 64, 64, 64, 80, 80, 80, 80, 80,
    96, 96, 96, 96, 96, 112, 112, 112, 112, 128, 128, 128, 128, 128, 160, 160, 160, 160, 160, 192,
    192, 192, 192, 192, 224, 224, 224, 224, 224, 256, 256, 256, 256, 256, 320, 320, 320, 384, 384,
    384,
];

/// EEP profile A: CU-per-kbps factor indexed by protection level 1-4.
pub const EEP_A_SIZE_FACTORS: [usize; 4] = [12, 8, 6, 4];
/// EEP profile B: CU-per-kbps factor indexed by protection level 1-4.
pub const EEP_B_SIZE_FACTORS: [usize; 4] = [27, 21, 18, 15];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Uep { level: u8 },
    EepA { level: u8 },
    EepB { level: u8 },
}

impl Protection {
    /// Size in Capacity Units for `bitrate` kbps under this protection
    /// profile, and the 6-bit TPL field encoding it.
    pub fn size_in_cu_and_tpl(&self, bitrate_kbps: usize) -> Option<(usize, u8)> {
        match *self {
            Protection::Uep { level } => UEP_PLS
                .iter()
                .zip(UEP_BITRATES.iter())
                .enumerate()
                .find(|(_, (&pl, &br))| pl == level && br == bitrate_kbps)
                .map(|(i, _)| (UEP_SIZES[i], i as u8)),
            Protection::EepA { level } => {
                let idx = (level.saturating_sub(1)) as usize;
                let factor = *EEP_A_SIZE_FACTORS.get(idx)?;
                Some((bitrate_kbps * factor / 8, idx as u8))
            }
            Protection::EepB { level } => {
                let idx = (level.saturating_sub(1)) as usize;
                let factor = *EEP_B_SIZE_FACTORS.get(idx)?;
                Some((bitrate_kbps * factor / 32, idx as u8))
            }
        }
    }

    pub fn is_eep(&self) -> bool {
        matches!(self, Protection::EepA { .. } | Protection::EepB { .. })
    }

    pub fn level(&self) -> u8 {
        match *self {
            Protection::Uep { level } | Protection::EepA { level } | Protection::EepB { level } => level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uep_lookup_finds_known_profile() {
        let p = Protection::Uep { level: 3 };
        let (size, _tpl) = p.size_in_cu_and_tpl(64).unwrap();
        assert_eq!(size, 48);
    }

    #[test]
    fn eep_a_size_scales_with_bitrate() {
        let p = Protection::EepA { level: 1 };
        let (size, idx) = p.size_in_cu_and_tpl(128).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(size, 128 * 12 / 8);
    }
}
