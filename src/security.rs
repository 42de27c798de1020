//! Password protection and permission flags for the final document.
//!
//! The permission mask follows the standard PDF permission layout, which
//! numbers bit positions from 1: bit 3 print, bit 4 modify, bit 5
//! copy/extract, bit 6 annotate, bit 9 form fill, bit 10 accessibility
//! extraction. The constants below hold the same positions as zero-based
//! shifts. The baseline grants everything; each restriction clears its bit.
//! Viewers consume the mask as a two's-complement 32-bit integer.

use crate::error::{Result, StampError};
use serde::{Deserialize, Serialize};

const PRINT_BIT: u32 = 1 << 2;
const MODIFY_BIT: u32 = 1 << 3;
const COPY_BIT: u32 = 1 << 4;
const ANNOTATE_BIT: u32 = 1 << 5;
const FORM_FILL_BIT: u32 = 1 << 8;
const ACCESSIBILITY_BIT: u32 = 1 << 9;

/// What the user password holder is forbidden to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restrictions {
    pub no_print: bool,
    pub no_modify: bool,
    pub no_copy: bool,
    pub no_annotate: bool,
    pub no_form_fill: bool,
    pub no_accessibility: bool,
}

impl Restrictions {
    /// Permission bits with every grant set, minus the restricted ones.
    pub fn permission_bits(&self) -> u32 {
        let mut bits = u32::MAX;
        if self.no_print {
            bits &= !PRINT_BIT;
        }
        if self.no_modify {
            bits &= !MODIFY_BIT;
        }
        if self.no_copy {
            bits &= !COPY_BIT;
        }
        if self.no_annotate {
            bits &= !ANNOTATE_BIT;
        }
        if self.no_form_fill {
            bits &= !FORM_FILL_BIT;
        }
        if self.no_accessibility {
            bits &= !ACCESSIBILITY_BIT;
        }
        bits
    }

    /// The mask as PDF dictionaries carry it.
    pub fn permission_mask(&self) -> i32 {
        self.permission_bits() as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub user_password: String,
    pub owner_password: String,
    pub restrictions: Restrictions,
}

impl Security {
    /// Checked before any page work so a bad configuration never produces
    /// partial output.
    pub fn validate(&self) -> Result<()> {
        if self.user_password.is_empty() || self.owner_password.is_empty() {
            return Err(StampError::InvalidSecurity(
                "both user and owner passwords are required".to_string(),
            ));
        }
        if self.user_password == self.owner_password {
            return Err(StampError::InvalidSecurity(
                "user and owner passwords must differ".to_string(),
            ));
        }
        Ok(())
    }
}
