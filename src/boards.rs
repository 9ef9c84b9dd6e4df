//! Catalog of supported developer boards.

use crate::Dependency;
use serde::Serialize;

/// How firmware reaches a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FlashMethod {
    /// Flashed directly through a SEGGER J-Link probe.
    JLink,
    /// A hex file is generated for TI Uniflash.
    Uniflash,
}

/// A developer board that can be provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    /// Identifier passed to the flashing tool.
    pub id: &'static str,
    /// Short display name.
    pub name: &'static str,
    /// Longer description.
    pub description: &'static str,
    /// Manufacturer.
    pub vendor: &'static str,
    /// Flash method.
    pub flash_method: FlashMethod,
}

impl Board {
    /// Whether the board is flashed directly through J-Link.
    pub fn requires_jlink(&self) -> bool {
        self.flash_method == FlashMethod::JLink
    }

    /// Tools that must be installed before this board can be provisioned.
    ///
    /// ```rust
    /// use hubble_install::{boards, Dependency};
    ///
    /// let board = boards::find("lp_em_cc2340r5").unwrap();
    /// assert_eq!(board.dependencies(), vec![Dependency::Uv]);
    /// ```
    pub fn dependencies(&self) -> Vec<Dependency> {
        match self.flash_method {
            // nrfutil drives the probe, the J-Link package provides its drivers.
            FlashMethod::JLink => vec![Dependency::Uv, Dependency::Nrfutil, Dependency::SeggerJlink],
            FlashMethod::Uniflash => vec![Dependency::Uv],
        }
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} ({})", self.name, self.description, self.vendor)
    }
}

/// Every supported board, in display order.
pub const BOARDS: &[Board] = &[
    Board {
        id: "nrf21540dk",
        name: "nRF21540 DK",
        description: "Nordic Semiconductor nRF21540 Development Kit",
        vendor: "Nordic",
        flash_method: FlashMethod::JLink,
    },
    Board {
        id: "nrf52840dk",
        name: "nRF52840 DK",
        description: "Nordic Semiconductor nRF52840 Development Kit",
        vendor: "Nordic",
        flash_method: FlashMethod::JLink,
    },
    Board {
        id: "lp_em_cc2340r5",
        name: "TI CC2340R5",
        description: "Texas Instruments CC2340R5 LaunchPad",
        vendor: "Texas Instruments",
        flash_method: FlashMethod::Uniflash,
    },
    Board {
        id: "lp_em_cc2340r53",
        name: "TI CC2340R53",
        description: "Texas Instruments CC2340R53 LaunchPad",
        vendor: "Texas Instruments",
        flash_method: FlashMethod::Uniflash,
    },
];

/// Look up a board by identifier.
pub fn find(id: &str) -> Option<&'static Board> {
    BOARDS.iter().find(|board| board.id == id)
}
