use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Non-bonded parameters of a single atom at one point along λ.
///
/// This is the minimal set of per-atom quantities the pair kernels consume. For
/// unperturbed atoms it is read straight from the [`Atom`]; for perturbed solute atoms
/// it is interpolated between the two endpoint parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AtomParams {
    /// The partial atomic charge in elementary charge units.
    pub charge: f64,
    /// The Lennard-Jones σ parameter in Angstroms.
    pub sigma: f64,
    /// The Lennard-Jones ε parameter (well depth) in kcal/mol.
    pub epsilon: f64,
}

impl AtomParams {
    /// Creates a new parameter set.
    pub fn new(charge: f64, sigma: f64, epsilon: f64) -> Self {
        Self {
            charge,
            sigma,
            epsilon,
        }
    }

    /// Linearly interpolates between two parameter sets.
    ///
    /// # Arguments
    ///
    /// * `initial` - Parameters at λ = 0.
    /// * `final_` - Parameters at λ = 1.
    /// * `lambda` - The interpolation point.
    ///
    /// # Return
    ///
    /// `(1 - λ)·initial + λ·final` applied component-wise.
    pub fn interpolate(initial: &Self, final_: &Self, lambda: f64) -> Self {
        let mix = |a: f64, b: f64| (1.0 - lambda) * a + lambda * b;
        Self {
            charge: mix(initial.charge, final_.charge),
            sigma: mix(initial.sigma, final_.sigma),
            epsilon: mix(initial.epsilon, final_.epsilon),
        }
    }

    /// Returns `true` if these parameters cannot produce any non-bonded interaction.
    pub fn is_null(&self) -> bool {
        self.charge == 0.0 && self.epsilon == 0.0
    }
}

/// Represents an atom in a molecule with its non-bonded parameters.
///
/// The position stored here is the template coordinate delivered by the structure
/// loader. Sampled coordinates live in a
/// [`Configuration`](super::configuration::Configuration) so they can be exchanged
/// between replicas without touching the static description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// The name of the atom (e.g., "C1", "OW", "H2").
    pub name: String,
    /// The force field atom type (e.g., "ca", "hc", "OW").
    pub force_field_type: String,
    /// The partial atomic charge in elementary charge units.
    pub partial_charge: f64,
    /// The Lennard-Jones σ parameter in Angstroms.
    pub sigma: f64,
    /// The Lennard-Jones ε parameter in kcal/mol.
    pub epsilon: f64,
    /// The template 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
}

impl Atom {
    /// Creates a new `Atom` with zeroed non-bonded parameters.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `position` - The template coordinates of the atom.
    pub fn new(name: &str, position: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            force_field_type: String::new(),
            partial_charge: 0.0,
            sigma: 0.0,
            epsilon: 0.0,
            position,
        }
    }

    /// Sets the non-bonded parameters, consuming and returning the atom.
    pub fn with_params(mut self, charge: f64, sigma: f64, epsilon: f64) -> Self {
        self.partial_charge = charge;
        self.sigma = sigma;
        self.epsilon = epsilon;
        self
    }

    /// Returns the non-bonded parameters of this atom.
    pub fn params(&self) -> AtomParams {
        AtomParams::new(self.partial_charge, self.sigma, self.epsilon)
    }
}
