pub mod neighbor;

pub use neighbor::enumerate_neighbor_lattice_points;
