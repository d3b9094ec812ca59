use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::constraints::ConstraintParams;
use crate::design::{Phase, PhaseParams};
use crate::error::ConfigError;
use crate::model::CompositionMultiset;
use crate::optimize::OptimizerParams;

/// 1 angstrom in atomic units (bohr radii), mirroring
/// `LengthCasting::cast<Angstrom, AtomicUnit>` in the original
/// (`spec.md` §6: "Lengths are converted from angstrom to atomic units at
/// load time"). Applied to every length-valued key read from a config
/// file; compiled-in `PhaseParams::default_for` values are already
/// expressed directly in this internal unit and are not re-scaled.
pub const LENGTH_SCALE: f64 = 1.889_725_988_6;

const REQUIRED_COORDINATION_BLOCK: &str = "FEASIBLE_COORDINATION_COMPOSITIONS";

/// A loaded, validated parameter file (`spec.md` §6). Holds the raw
/// key/value overrides plus the required coordination-composition
/// dictionary; `build_constraint_params` / `build_phases` merge these
/// onto the compiled-in defaults.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub pressure: Option<f64>,
    pub attractive_force_constant: Option<f64>,
    pub repulsive_force_constant: Option<f64>,
    pub iterations: Option<usize>,
    pub initial_max_atomic_displacement: Option<f64>,
    pub final_max_atomic_displacement: Option<f64>,
    pub max_unit_cell_displacement_factor: Option<f64>,
    pub feasible_error_rate: Option<f64>,
    pub exclusive_radius_ratio: Option<f64>,
    pub tracer_cutoff_ratio: Option<f64>,
    pub constrainer_cutoff_ratio: Option<f64>,
    pub feasible_coordination_compositions: HashMap<String, HashSet<CompositionMultiset>>,
}

enum Line<'a> {
    Blank,
    SectionStart(&'a str),
    SectionEnd,
    KeyValue(&'a str, &'a str),
}

fn classify_line(raw: &str) -> Line<'_> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        Line::Blank
    } else if line.eq_ignore_ascii_case("&END") {
        Line::SectionEnd
    } else if let Some(name) = line.strip_prefix('&') {
        Line::SectionStart(name.trim())
    } else {
        match line.split_once(char::is_whitespace) {
            Some((key, value)) => Line::KeyValue(key, value.trim()),
            None => Line::KeyValue(line, ""),
        }
    }
}

fn parse_f64(key: &str, value: &str, line: usize) -> Result<f64, ConfigError> {
    value.parse().map_err(|e: std::num::ParseFloatError| ConfigError::ParseFailure {
        line,
        source: anyhow::anyhow!("{key}: {e}"),
    })
}

fn parse_usize(key: &str, value: &str, line: usize) -> Result<usize, ConfigError> {
    value.parse().map_err(|e: std::num::ParseIntError| ConfigError::ParseFailure {
        line,
        source: anyhow::anyhow!("{key}: {e}"),
    })
}

/// Parses a `&FEASIBLE_COORDINATION_COMPOSITIONS` key like `Na+1` or `Cl-1`
/// into its element symbol and formal charge (`SPEC_FULL.md` §6+:
/// `ELEMENT[charge] token token ...`). A bare symbol with no sign is charge
/// zero.
pub fn parse_ionic_key(key: &str) -> Option<(String, i32)> {
    let pattern = Regex::new(r"^([A-Z][a-z]?)([+-]\d+)?$").expect("static regex is valid");
    let captures = pattern.captures(key)?;
    let symbol = captures[1].to_string();
    let charge = captures.get(2).map(|m| m.as_str().parse().ok()).flatten().unwrap_or(0);
    Some((symbol, charge))
}

/// Parses a composition token like `O_2Si_1` into `{O: 2, Si: 1}`
/// (`spec.md` §6, `SPEC_FULL.md` §6+'s `([A-Z][a-z]?)_(\d+)` pattern).
fn parse_composition_token(token: &str, line: usize) -> Result<CompositionMultiset, ConfigError> {
    let pattern = Regex::new(r"([A-Z][a-z]?)_(\d+)").expect("static regex is valid");
    let mut composition = CompositionMultiset::new();
    let mut matched_any = false;
    for captures in pattern.captures_iter(token) {
        matched_any = true;
        let element = captures[1].to_string();
        let count: u32 = captures[2].parse().map_err(|e: std::num::ParseIntError| ConfigError::ParseFailure {
            line,
            source: anyhow::anyhow!("composition token {token}: {e}"),
        })?;
        *composition.entry(element).or_insert(0) += count;
    }
    if !matched_any {
        return Err(ConfigError::ParseFailure {
            line,
            source: anyhow::anyhow!("malformed composition token: {token}"),
        });
    }
    Ok(composition)
}

/// Parses the key/value + `&NAME`/`&END` block grammar (`spec.md` §6,
/// `SPEC_FULL.md` §6+). Unrecognised top-level keys are ignored rather
/// than rejected, matching "partial list" framing of the option table;
/// unrecognised section names are rejected since the required block name
/// is fixed.
pub fn parse(text: &str) -> Result<RunConfig, ConfigError> {
    let mut config = RunConfig::default();
    let mut in_coordination_block = false;
    let mut saw_coordination_block = false;

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        match classify_line(raw_line) {
            Line::Blank => {}
            Line::SectionStart(name) => {
                if !name.eq_ignore_ascii_case(REQUIRED_COORDINATION_BLOCK) {
                    return Err(ConfigError::ParseFailure {
                        line: line_number,
                        source: anyhow::anyhow!("unknown section &{name}"),
                    });
                }
                in_coordination_block = true;
                saw_coordination_block = true;
            }
            Line::SectionEnd => {
                in_coordination_block = false;
            }
            Line::KeyValue(key, value) if in_coordination_block => {
                let mut compositions = HashSet::new();
                for token in value.split_whitespace() {
                    compositions.insert(parse_composition_token(token, line_number)?);
                }
                config.feasible_coordination_compositions.insert(key.to_string(), compositions);
            }
            Line::KeyValue(key, value) => apply_top_level_key(&mut config, key, value, line_number)?,
        }
    }

    if !saw_coordination_block {
        return Err(ConfigError::MissingRequiredBlock { block: REQUIRED_COORDINATION_BLOCK.to_string() });
    }

    Ok(config)
}

fn apply_top_level_key(config: &mut RunConfig, key: &str, value: &str, line: usize) -> Result<(), ConfigError> {
    match key {
        "Pressure" => config.pressure = Some(parse_f64(key, value, line)?),
        "Attractive.Force.Constants" => config.attractive_force_constant = Some(parse_f64(key, value, line)?),
        "Repulsive.Force.Constants" => config.repulsive_force_constant = Some(parse_f64(key, value, line)?),
        "Number.of.Iterative.Balance.Steps" => config.iterations = Some(parse_usize(key, value, line)?),
        "Initial.Maximum.Atomic.Displacement" => {
            config.initial_max_atomic_displacement = Some(parse_f64(key, value, line)? * LENGTH_SCALE)
        }
        "Final.Maximum.Atomic.Displacement" => {
            config.final_max_atomic_displacement = Some(parse_f64(key, value, line)? * LENGTH_SCALE)
        }
        "Maximum.Unit.Cell.Displacement.Factor" => {
            config.max_unit_cell_displacement_factor = Some(parse_f64(key, value, line)?)
        }
        "Feasible.Geometrical.Constraint.Error.Rate" => {
            config.feasible_error_rate = Some(parse_f64(key, value, line)?)
        }
        "Minimum.Exclusion.Distance.Ratio" => config.exclusive_radius_ratio = Some(parse_f64(key, value, line)?),
        "Interatomic.Distance.Tracer.Cutoff.Ratio" => {
            config.tracer_cutoff_ratio = Some(parse_f64(key, value, line)?)
        }
        "Interatomic.Distance.Constrainer.Cutoff.Ratio" => {
            config.constrainer_cutoff_ratio = Some(parse_f64(key, value, line)?)
        }
        _ => {}
    }
    Ok(())
}

impl RunConfig {
    /// Merges the loaded overrides onto `ConstraintParams::default()`,
    /// then validates the result (`spec.md` §7 configuration-error
    /// taxonomy: "Numeric validation rejects negative pressure,
    /// non-positive decreases in displacement per step, `ρ_ex < 1`...").
    pub fn build_constraint_params(&self) -> Result<ConstraintParams, ConfigError> {
        let defaults = ConstraintParams::default();
        let params = ConstraintParams {
            feasible_error_rate: self.feasible_error_rate.unwrap_or(defaults.feasible_error_rate),
            exclusive_radius_ratio: self.exclusive_radius_ratio.unwrap_or(defaults.exclusive_radius_ratio),
            tracer_cutoff_ratio: self.tracer_cutoff_ratio.unwrap_or(defaults.tracer_cutoff_ratio),
            constrainer_cutoff_ratio: self.constrainer_cutoff_ratio.unwrap_or(defaults.constrainer_cutoff_ratio),
            ..defaults
        };
        params.validate()?;
        Ok(params)
    }

    /// Merges shared optimizer overrides onto the compiled-in three-phase
    /// schedule. `spec.md` §6's option table lists these keys flat rather
    /// than per-phase; this crate's decision (documented in `DESIGN.md`)
    /// is to apply a present override identically across global/local/
    /// precise, since the distilled spec gives no per-phase section
    /// syntax to target one phase only.
    pub fn build_phases(&self) -> Result<[PhaseParams; 3], ConfigError> {
        if let Some(pressure) = self.pressure {
            if pressure < 0.0 {
                return Err(ConfigError::OutOfRange { key: "Pressure".to_string(), value: pressure });
            }
        }
        if let (Some(initial), Some(final_)) =
            (self.initial_max_atomic_displacement, self.final_max_atomic_displacement)
        {
            if final_ > initial {
                return Err(ConfigError::OutOfRange {
                    key: "Final.Maximum.Atomic.Displacement".to_string(),
                    value: final_,
                });
            }
        }

        let mut phases = PhaseParams::default_triple();
        for phase in &mut phases {
            apply_optimizer_overrides(&mut phase.optimizer, self);
        }
        Ok(phases)
    }

    /// Builds one `Species` per key in `&FEASIBLE_COORDINATION_COMPOSITIONS`,
    /// pairing its explicit coordination compositions with radii looked up
    /// from the compiled-in `crate::model::builtin_species_templates` table
    /// by element symbol and formal charge.
    pub fn build_species(&self) -> Result<Vec<crate::model::Species>, ConfigError> {
        use crate::model::{builtin_species_templates, CoordinationConstraints, Species};

        let templates = builtin_species_templates();
        let mut species = Vec::with_capacity(self.feasible_coordination_compositions.len());

        for (key, compositions) in &self.feasible_coordination_compositions {
            let (symbol, charge) = parse_ionic_key(key).ok_or_else(|| ConfigError::ParseFailure {
                line: 0,
                source: anyhow::anyhow!("malformed species key: {key}"),
            })?;
            let template = templates
                .iter()
                .find(|t| t.symbol == symbol && t.charge == charge)
                .ok_or_else(|| ConfigError::ParseFailure {
                    line: 0,
                    source: anyhow::anyhow!("no built-in species template for {key}"),
                })?;

            let built = Species {
                symbol: template.symbol.to_string(),
                ionic_atomic_number: template.ionic_atomic_number(),
                covalent_radius: template.covalent_radius,
                ionic_radius: template.ionic_radius,
                repulsion_radius: template.repulsion_radius,
                coordination: CoordinationConstraints::explicit(compositions.clone()),
            };
            built.validate()?;
            species.push(built);
        }

        Ok(species)
    }
}

fn apply_optimizer_overrides(optimizer: &mut OptimizerParams, config: &RunConfig) {
    if let Some(v) = config.pressure {
        optimizer.pressure = v;
    }
    if let Some(v) = config.attractive_force_constant {
        optimizer.attractive_force_constant = v;
    }
    if let Some(v) = config.repulsive_force_constant {
        optimizer.repulsive_force_constant = v;
    }
    if let Some(v) = config.iterations {
        optimizer.iterations = v;
    }
    if let Some(v) = config.initial_max_atomic_displacement {
        optimizer.initial_max_atomic_displacement = v;
    }
    if let Some(v) = config.final_max_atomic_displacement {
        optimizer.final_max_atomic_displacement = v;
    }
    if let Some(v) = config.max_unit_cell_displacement_factor {
        optimizer.max_unit_cell_displacement_factor = v;
    }
}

#[allow(dead_code)]
fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Global => "global",
        Phase::Local => "local",
        Phase::Precise => "precise",
    }
}
