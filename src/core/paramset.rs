//! Bundle up parameters and their values in a generic way.

// ngp
use crate::core::error::{NgpError, Result};
use crate::core::geometry::Point3f;
use crate::core::ngp::{Float, Spectrum};

#[derive(Debug, Clone)]
pub struct ParamSetItem<T> {
    pub name: String,
    pub values: Vec<T>,
}

impl<T> ParamSetItem<T> {
    pub fn n_values(&self) -> usize {
        self.values.len()
    }
}

/// Parameters of one scene statement, e.g. `Field "sphere"`.
#[derive(Debug, Default, Clone)]
pub struct ParamSet {
    pub key_word: String,
    pub name: String,
    pub bools: Vec<ParamSetItem<bool>>,
    pub ints: Vec<ParamSetItem<i32>>,
    pub floats: Vec<ParamSetItem<Float>>,
    pub point3fs: Vec<ParamSetItem<Point3f>>,
    pub spectra: Vec<ParamSetItem<Spectrum>>,
    pub strings: Vec<ParamSetItem<String>>,
}

impl ParamSet {
    pub fn new(key_word: &str, name: &str) -> Self {
        ParamSet {
            key_word: key_word.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }
    pub fn add_bools(&mut self, name: String, values: Vec<bool>) {
        self.bools.push(ParamSetItem { name, values });
    }
    pub fn add_ints(&mut self, name: String, values: Vec<i32>) {
        self.ints.push(ParamSetItem { name, values });
    }
    pub fn add_floats(&mut self, name: String, values: Vec<Float>) {
        self.floats.push(ParamSetItem { name, values });
    }
    pub fn add_strings(&mut self, name: String, values: Vec<String>) {
        self.strings.push(ParamSetItem { name, values });
    }
    pub fn add_point3fs(&mut self, name: String, values: Vec<Float>) -> Result<()> {
        if values.len() % 3 != 0 {
            return Err(NgpError::Parse(format!(
                "point parameters need 3 coordinates ({} found for {:?})",
                values.len(),
                name
            )));
        }
        let points: Vec<Point3f> = values
            .chunks(3)
            .map(|c| Point3f::new(c[0], c[1], c[2]))
            .collect();
        self.point3fs.push(ParamSetItem {
            name,
            values: points,
        });
        Ok(())
    }
    pub fn add_rgb_spectra(&mut self, name: String, values: Vec<Float>) -> Result<()> {
        if values.len() % 3 != 0 {
            return Err(NgpError::Parse(format!(
                "rgb parameters need 3 components ({} found for {:?})",
                values.len(),
                name
            )));
        }
        let spectra: Vec<Spectrum> = values
            .chunks(3)
            .map(|c| Spectrum::rgb(c[0], c[1], c[2]))
            .collect();
        self.spectra.push(ParamSetItem {
            name,
            values: spectra,
        });
        Ok(())
    }
    pub fn find_one_float(&self, name: &str, d: Float) -> Float {
        lookup_one(&self.floats, name, d)
    }
    pub fn find_one_int(&self, name: &str, d: i32) -> i32 {
        lookup_one(&self.ints, name, d)
    }
    pub fn find_one_bool(&self, name: &str, d: bool) -> bool {
        lookup_one(&self.bools, name, d)
    }
    pub fn find_one_point3f(&self, name: &str, d: Point3f) -> Point3f {
        lookup_one(&self.point3fs, name, d)
    }
    pub fn find_one_spectrum(&self, name: &str, d: Spectrum) -> Spectrum {
        lookup_one(&self.spectra, name, d)
    }
    pub fn find_one_string(&self, name: &str, d: String) -> String {
        lookup_one(&self.strings, name, d)
    }
    pub fn has_spectrum(&self, name: &str) -> bool {
        self.spectra.iter().any(|v| v.name == name)
    }
    pub fn find_float(&self, name: &str) -> Vec<Float> {
        lookup_all(&self.floats, name)
    }
    pub fn find_point3f(&self, name: &str) -> Vec<Point3f> {
        lookup_all(&self.point3fs, name)
    }
}

/// Single value parameter *name*, or *d* if there is none.
pub fn lookup_one<T>(vec: &[ParamSetItem<T>], name: &str, d: T) -> T
where
    T: Clone,
{
    for v in vec {
        if v.name == name && v.n_values() == 1_usize {
            return v.values[0].clone();
        }
    }
    d
}

/// All values of parameter *name*.
pub fn lookup_all<T>(vec: &[ParamSetItem<T>], name: &str) -> Vec<T>
where
    T: Clone,
{
    vec.iter()
        .filter(|v| v.name == name)
        .flat_map(|v| v.values.iter().cloned())
        .collect()
}
