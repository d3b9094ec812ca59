use super::species::{IonicAtomicNumber, RadiusRange};

/// Per-species radii, without coordination constraints attached yet.
/// `spec.md` §1 treats "the coordination-constraint dictionary content" as
/// an external static lookup service; radii themselves are not named as a
/// config option (§6's option table has none), so this crate ships a small
/// compiled-in table of common ions as the process-wide static dictionary
/// the Design Notes describe ("construct once during startup, share by
/// read-only reference"). A deployment with a richer dictionary would
/// replace `builtin_species_templates` with one loaded from that external
/// service.
#[derive(Debug, Clone)]
pub struct SpeciesTemplate {
    pub symbol: &'static str,
    pub charge: i32,
    pub element: u8,
    pub covalent_radius: RadiusRange,
    pub ionic_radius: RadiusRange,
    pub repulsion_radius: RadiusRange,
}

impl SpeciesTemplate {
    pub fn ionic_atomic_number(&self) -> IonicAtomicNumber {
        IonicAtomicNumber { element: self.element, charge: self.charge }
    }
}

/// A handful of common rock-salt/oxide-forming ions, radii in angstrom
/// (converted to this crate's internal length unit wherever they are
/// combined with config-file values, via `crate::config::LENGTH_SCALE`).
pub fn builtin_species_templates() -> Vec<SpeciesTemplate> {
    vec![
        SpeciesTemplate {
            symbol: "Na",
            charge: 1,
            element: 11,
            covalent_radius: RadiusRange::new(0.9, 1.1),
            ionic_radius: RadiusRange::new(0.9, 1.1),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
        },
        SpeciesTemplate {
            symbol: "Cl",
            charge: -1,
            element: 17,
            covalent_radius: RadiusRange::new(1.7, 1.9),
            ionic_radius: RadiusRange::new(1.7, 1.9),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
        },
        SpeciesTemplate {
            symbol: "Mg",
            charge: 2,
            element: 12,
            covalent_radius: RadiusRange::new(0.6, 0.8),
            ionic_radius: RadiusRange::new(0.6, 0.8),
            repulsion_radius: RadiusRange::new(0.4, 0.4),
        },
        SpeciesTemplate {
            symbol: "O",
            charge: -2,
            element: 8,
            covalent_radius: RadiusRange::new(1.3, 1.5),
            ionic_radius: RadiusRange::new(1.3, 1.5),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
        },
        SpeciesTemplate {
            symbol: "Ca",
            charge: 2,
            element: 20,
            covalent_radius: RadiusRange::new(0.9, 1.1),
            ionic_radius: RadiusRange::new(0.9, 1.1),
            repulsion_radius: RadiusRange::new(0.5, 0.5),
        },
        SpeciesTemplate {
            symbol: "Si",
            charge: 4,
            element: 14,
            covalent_radius: RadiusRange::new(0.3, 0.5),
            ionic_radius: RadiusRange::new(0.3, 0.5),
            repulsion_radius: RadiusRange::new(0.3, 0.3),
        },
    ]
}
