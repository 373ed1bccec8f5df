//! Scalar-to-color mapping.
//!
//! Turns the active scalar array of a polydata into either per-tuple RGBA8
//! colors or, when interpolating before mapping, into 1-D texture coordinates
//! plus a color ramp texture. Results are cached on the identity and stamps
//! of everything that feeds them, and the output arrays keep their identity
//! across remaps so downstream buffer caches see a stamp change rather than
//! a brand-new source.

use super::data_array::ArrayRef;
use super::polydata::PolyData;
use super::texture::{ImageData, Texture};
use super::version_tracker::{ChangeTracker, ModificationTime};

/// Which attribute the scalars are taken from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScalarMode {
    /// Point scalars if present, otherwise cell scalars.
    #[default]
    Default,
    UsePointData,
    UseCellData,
}

/// HSV ramp lookup table.
#[derive(Debug, Clone)]
pub struct LookupTable {
    range: Option<(f64, f64)>,
    hue_range: (f64, f64),
    saturation: f64,
    value: f64,
    number_of_colors: usize,
    tracker: ChangeTracker,
}

impl Default for LookupTable {
    fn default() -> Self {
        Self {
            range: None,
            hue_range: (0.6667, 0.0),
            saturation: 1.0,
            value: 1.0,
            number_of_colors: 256,
            tracker: ChangeTracker::new(),
        }
    }
}

impl LookupTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed scalar range; `None` uses the data range.
    pub fn set_range(&mut self, range: Option<(f64, f64)>) {
        self.range = range;
        self.tracker.modified();
    }

    pub fn set_hue_range(&mut self, from: f64, to: f64) {
        self.hue_range = (from, to);
        self.tracker.modified();
    }

    pub fn set_number_of_colors(&mut self, count: usize) {
        self.number_of_colors = count.max(2);
        self.tracker.modified();
    }

    #[must_use]
    pub fn number_of_colors(&self) -> usize {
        self.number_of_colors
    }

    #[must_use]
    pub fn last_modified(&self) -> ModificationTime {
        self.tracker.last_modified()
    }

    /// Color of table entry `index`.
    #[must_use]
    pub fn table_color(&self, index: usize) -> [u8; 3] {
        let last = (self.number_of_colors - 1) as f64;
        let t = index.min(self.number_of_colors - 1) as f64 / last;
        let hue = self.hue_range.0 + (self.hue_range.1 - self.hue_range.0) * t;
        hsv_to_rgb(hue, self.saturation, self.value)
    }

    /// Maps a scalar to a color through the table.
    #[must_use]
    pub fn map_value(&self, value: f64, range: (f64, f64)) -> [u8; 3] {
        let t = normalize(value, range);
        let index = (t * self.number_of_colors as f64) as usize;
        self.table_color(index)
    }
}

fn normalize(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [u8; 3] {
    let h = h.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match sector as u32 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [r, g, b].map(|c| (c * 255.0).round().clamp(0.0, 255.0) as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MapKey {
    scalars: u64,
    scalars_time: ModificationTime,
    table_time: ModificationTime,
    settings_time: ModificationTime,
    alpha_bits: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mapped {
    None,
    Colors,
    Coordinates,
}

/// Scalar coloring state of a renderable.
#[derive(Debug, Clone)]
pub struct ColorMapping {
    scalar_visibility: bool,
    scalar_mode: ScalarMode,
    interpolate_scalars_before_mapping: bool,
    lookup_table: LookupTable,

    mapped: Mapped,
    key: Option<MapKey>,
    colors: Option<ArrayRef>,
    color_coordinates: Option<ArrayRef>,
    color_texture: Option<Texture>,

    tracker: ChangeTracker,
}

impl Default for ColorMapping {
    fn default() -> Self {
        Self {
            scalar_visibility: true,
            scalar_mode: ScalarMode::Default,
            interpolate_scalars_before_mapping: false,
            lookup_table: LookupTable::default(),
            mapped: Mapped::None,
            key: None,
            colors: None,
            color_coordinates: None,
            color_texture: None,
            tracker: ChangeTracker::new(),
        }
    }
}

impl ColorMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn scalar_visibility(&self) -> bool {
        self.scalar_visibility
    }

    pub fn set_scalar_visibility(&mut self, visible: bool) {
        self.scalar_visibility = visible;
        self.tracker.modified();
    }

    #[must_use]
    pub fn scalar_mode(&self) -> ScalarMode {
        self.scalar_mode
    }

    pub fn set_scalar_mode(&mut self, mode: ScalarMode) {
        self.scalar_mode = mode;
        self.tracker.modified();
    }

    #[must_use]
    pub fn interpolate_scalars_before_mapping(&self) -> bool {
        self.interpolate_scalars_before_mapping
    }

    pub fn set_interpolate_scalars_before_mapping(&mut self, interpolate: bool) {
        self.interpolate_scalars_before_mapping = interpolate;
        self.tracker.modified();
    }

    #[must_use]
    pub fn lookup_table(&self) -> &LookupTable {
        &self.lookup_table
    }

    pub fn lookup_table_mut(&mut self) -> &mut LookupTable {
        &mut self.lookup_table
    }

    #[must_use]
    pub fn last_modified(&self) -> ModificationTime {
        self.tracker
            .last_modified()
            .max(self.lookup_table.last_modified())
    }

    /// The scalar array in use and whether it is cell-associated.
    #[must_use]
    pub fn active_scalars<'a>(&self, input: &'a PolyData) -> Option<(&'a ArrayRef, bool)> {
        let point = input.point_data().scalars.as_ref().map(|s| (s, false));
        let cell = input.cell_data().scalars.as_ref().map(|s| (s, true));
        match self.scalar_mode {
            ScalarMode::Default => point.or(cell),
            ScalarMode::UsePointData => point,
            ScalarMode::UseCellData => cell,
        }
    }

    /// Whether mapped colors must be addressed per cell.
    #[must_use]
    pub fn uses_cell_scalars(&self, input: &PolyData) -> bool {
        self.active_scalars(input).is_some_and(|(_, cell)| cell)
    }

    /// Per-tuple RGBA8 colors from the last [`map_scalars`](Self::map_scalars).
    #[must_use]
    pub fn color_map_colors(&self) -> Option<&ArrayRef> {
        match self.mapped {
            Mapped::Colors => self.colors.as_ref(),
            _ => None,
        }
    }

    /// Ramp coordinates when interpolating before mapping.
    #[must_use]
    pub fn color_coordinates(&self) -> Option<&ArrayRef> {
        match self.mapped {
            Mapped::Coordinates => self.color_coordinates.as_ref(),
            _ => None,
        }
    }

    /// Ramp texture when interpolating before mapping.
    #[must_use]
    pub fn color_texture_map(&self) -> Option<&Texture> {
        match self.mapped {
            Mapped::Coordinates => self.color_texture.as_ref(),
            _ => None,
        }
    }

    /// Recomputes colors if any input changed since the last call.
    pub fn map_scalars(&mut self, input: &PolyData, alpha: f64) {
        let active = if self.scalar_visibility {
            self.active_scalars(input)
        } else {
            None
        };
        let Some((scalars, cell)) = active else {
            self.mapped = Mapped::None;
            self.key = None;
            return;
        };

        let key = MapKey {
            scalars: scalars.id(),
            scalars_time: scalars.last_modified(),
            table_time: self.lookup_table.last_modified(),
            settings_time: self.tracker.last_modified(),
            alpha_bits: alpha.to_bits(),
        };
        if self.key == Some(key) {
            return;
        }

        let direct = scalars.read().is_uint8() && scalars.components() >= 3;
        let range = self
            .lookup_table
            .range
            .or_else(|| scalars.range(0))
            .unwrap_or((0.0, 1.0));

        if self.interpolate_scalars_before_mapping && !cell && !direct {
            self.map_to_coordinates(scalars, range, alpha);
        } else {
            self.map_to_colors(scalars, range, alpha, direct);
        }
        log::debug!("Mapped scalars '{}' ({:?})", scalars.name(), self.mapped);
        self.key = Some(key);
    }

    fn map_to_colors(&mut self, scalars: &ArrayRef, range: (f64, f64), alpha: f64, direct: bool) {
        let comps = scalars.components();
        let tuples = scalars.number_of_tuples();
        let mut rgba = Vec::with_capacity(tuples * 4);
        {
            let values = scalars.read();
            for i in 0..tuples {
                let base = i * comps;
                let (rgb, a) = if direct {
                    let a = if comps > 3 { values.get(base + 3) } else { 255.0 };
                    (
                        [0, 1, 2].map(|c| values.get(base + c) as u8),
                        a,
                    )
                } else {
                    (self.lookup_table.map_value(values.get(base), range), 255.0)
                };
                rgba.extend_from_slice(&rgb);
                rgba.push((a * alpha).round().clamp(0.0, 255.0) as u8);
            }
        }
        match &self.colors {
            Some(colors) => colors.set_values(rgba),
            None => self.colors = Some(ArrayRef::new("Colors", 4, rgba)),
        }
        self.mapped = Mapped::Colors;
    }

    fn map_to_coordinates(&mut self, scalars: &ArrayRef, range: (f64, f64), alpha: f64) {
        let comps = scalars.components();
        let tuples = scalars.number_of_tuples();
        let mut coords = Vec::with_capacity(tuples * 2);
        {
            let values = scalars.read();
            for i in 0..tuples {
                coords.push(normalize(values.get(i * comps), range) as f32);
                coords.push(0.5);
            }
        }
        match &self.color_coordinates {
            Some(c) => c.set_values(coords),
            None => self.color_coordinates = Some(ArrayRef::new("ColorCoordinates", 2, coords)),
        }

        let count = self.lookup_table.number_of_colors();
        let a = (alpha * 255.0).round().clamp(0.0, 255.0) as u8;
        let mut pixels = Vec::with_capacity(count * 4);
        for i in 0..count {
            pixels.extend_from_slice(&self.lookup_table.table_color(i));
            pixels.push(a);
        }
        let image = ImageData::new(count as u32, 1, pixels);
        self.color_texture
            .get_or_insert_with(Texture::new)
            .set_image(image);
        self.mapped = Mapped::Coordinates;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::data_array::DataValues;

    fn polydata_with_point_scalars(values: Vec<f32>) -> (PolyData, ArrayRef) {
        let scalars = ArrayRef::new("s", 1, values);
        let mut pd = PolyData::new();
        pd.set_point_scalars(Some(scalars.clone()));
        (pd, scalars)
    }

    #[test]
    fn ramp_endpoints_are_blue_and_red() {
        let lut = LookupTable::new();
        assert_eq!(lut.map_value(0.0, (0.0, 1.0)), [0, 0, 255]);
        assert_eq!(lut.map_value(1.0, (0.0, 1.0)), [255, 0, 0]);
    }

    #[test]
    fn colors_keep_identity_across_remaps() {
        let (pd, scalars) = polydata_with_point_scalars(vec![0.0, 1.0]);
        let mut mapping = ColorMapping::new();
        mapping.map_scalars(&pd, 1.0);
        let first = mapping.color_map_colors().cloned().unwrap();
        let first_time = first.last_modified();

        mapping.map_scalars(&pd, 1.0);
        assert_eq!(mapping.color_map_colors().unwrap().last_modified(), first_time);

        scalars.set_values(vec![1.0_f32, 0.0]);
        mapping.map_scalars(&pd, 1.0);
        let second = mapping.color_map_colors().unwrap();
        assert_eq!(*second, first);
        assert!(second.last_modified() > first_time);
    }

    #[test]
    fn rgba_scalars_pass_through() {
        let scalars = ArrayRef::new("rgba", 4, vec![10_u8, 20, 30, 255]);
        let mut pd = PolyData::new();
        pd.set_point_scalars(Some(scalars));
        let mut mapping = ColorMapping::new();
        mapping.map_scalars(&pd, 0.5);
        let colors = mapping.color_map_colors().unwrap();
        assert_eq!(*colors.read(), DataValues::Uint8(vec![10, 20, 30, 128]));
    }

    #[test]
    fn interpolation_produces_coordinates_and_texture() {
        let (pd, _) = polydata_with_point_scalars(vec![0.0, 2.0, 4.0]);
        let mut mapping = ColorMapping::new();
        mapping.set_interpolate_scalars_before_mapping(true);
        mapping.map_scalars(&pd, 1.0);
        assert!(mapping.color_map_colors().is_none());
        let coords = mapping.color_coordinates().unwrap();
        assert_eq!(coords.components(), 2);
        assert_eq!(*coords.read(), DataValues::Float32(vec![0.0, 0.5, 0.5, 0.5, 1.0, 0.5]));
        assert!(mapping.color_texture_map().unwrap().has_image());
    }

    #[test]
    fn hidden_scalars_map_to_nothing() {
        let (pd, _) = polydata_with_point_scalars(vec![0.0, 1.0]);
        let mut mapping = ColorMapping::new();
        mapping.set_scalar_visibility(false);
        mapping.map_scalars(&pd, 1.0);
        assert!(mapping.color_map_colors().is_none());
        assert!(mapping.color_coordinates().is_none());
    }

    #[test]
    fn cell_scalars_used_without_point_scalars() {
        let mut pd = PolyData::new();
        pd.set_cell_scalars(Some(ArrayRef::new("c", 1, vec![1.0_f32])));
        let mapping = ColorMapping::new();
        assert!(mapping.uses_cell_scalars(&pd));
    }
}
