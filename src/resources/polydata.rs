use super::cell_array::CellArrayRef;
use super::data_array::ArrayRef;
use super::version_tracker::{ChangeTracker, ModificationTime};

/// The four cell buckets of a polydata, in drawing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Verts,
    Lines,
    Polys,
    Strips,
}

impl PrimitiveType {
    pub const ALL: [Self; 4] = [Self::Verts, Self::Lines, Self::Polys, Self::Strips];

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Point-associated attribute arrays.
#[derive(Debug, Clone, Default)]
pub struct PointData {
    pub normals: Option<ArrayRef>,
    pub scalars: Option<ArrayRef>,
    pub tcoords: Option<ArrayRef>,
}

/// Cell-associated attribute arrays. Cell tuples are indexed across all
/// buckets in [`PrimitiveType::ALL`] order.
#[derive(Debug, Clone, Default)]
pub struct CellData {
    pub scalars: Option<ArrayRef>,
}

/// Points plus cell connectivity plus attribute arrays.
#[derive(Debug, Clone, Default)]
pub struct PolyData {
    points: Option<ArrayRef>,
    verts: CellArrayRef,
    lines: CellArrayRef,
    polys: CellArrayRef,
    strips: CellArrayRef,
    point_data: PointData,
    cell_data: CellData,
    tracker: ChangeTracker,
}

impl PolyData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn points(&self) -> Option<&ArrayRef> {
        self.points.as_ref()
    }

    pub fn set_points(&mut self, points: Option<ArrayRef>) {
        self.points = points;
        self.tracker.modified();
    }

    #[must_use]
    pub fn cells(&self, primitive: PrimitiveType) -> &CellArrayRef {
        match primitive {
            PrimitiveType::Verts => &self.verts,
            PrimitiveType::Lines => &self.lines,
            PrimitiveType::Polys => &self.polys,
            PrimitiveType::Strips => &self.strips,
        }
    }

    pub fn set_cells(&mut self, primitive: PrimitiveType, cells: CellArrayRef) {
        match primitive {
            PrimitiveType::Verts => self.verts = cells,
            PrimitiveType::Lines => self.lines = cells,
            PrimitiveType::Polys => self.polys = cells,
            PrimitiveType::Strips => self.strips = cells,
        }
        self.tracker.modified();
    }

    #[must_use]
    pub fn point_data(&self) -> &PointData {
        &self.point_data
    }

    #[must_use]
    pub fn cell_data(&self) -> &CellData {
        &self.cell_data
    }

    pub fn set_normals(&mut self, normals: Option<ArrayRef>) {
        self.point_data.normals = normals;
        self.tracker.modified();
    }

    pub fn set_point_scalars(&mut self, scalars: Option<ArrayRef>) {
        self.point_data.scalars = scalars;
        self.tracker.modified();
    }

    pub fn set_tcoords(&mut self, tcoords: Option<ArrayRef>) {
        self.point_data.tcoords = tcoords;
        self.tracker.modified();
    }

    pub fn set_cell_scalars(&mut self, scalars: Option<ArrayRef>) {
        self.cell_data.scalars = scalars;
        self.tracker.modified();
    }

    /// Number of cells in the buckets preceding `primitive`.
    #[must_use]
    pub fn cell_offset(&self, primitive: PrimitiveType) -> usize {
        PrimitiveType::ALL
            .iter()
            .take_while(|p| **p != primitive)
            .map(|p| self.cells(*p).number_of_cells())
            .sum()
    }

    /// Latest stamp of the polydata or anything it references.
    #[must_use]
    pub fn last_modified(&self) -> ModificationTime {
        let arrays = [
            self.points.as_ref(),
            self.point_data.normals.as_ref(),
            self.point_data.scalars.as_ref(),
            self.point_data.tcoords.as_ref(),
            self.cell_data.scalars.as_ref(),
        ];
        let cells = PrimitiveType::ALL.map(|p| self.cells(p).last_modified());
        arrays
            .into_iter()
            .flatten()
            .map(ArrayRef::last_modified)
            .chain(cells)
            .fold(self.tracker.last_modified(), ModificationTime::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_edits_propagate_to_polydata_mtime() {
        let points = ArrayRef::new("points", 3, vec![0.0_f32; 9]);
        let mut pd = PolyData::new();
        pd.set_points(Some(points.clone()));
        let before = pd.last_modified();
        points.set_values(vec![1.0_f32; 9]);
        assert!(pd.last_modified() > before);
    }

    #[test]
    fn cell_offset_counts_preceding_buckets() {
        let mut pd = PolyData::new();
        pd.set_cells(PrimitiveType::Verts, CellArrayRef::from_cells(&[&[0], &[1]]));
        pd.set_cells(PrimitiveType::Lines, CellArrayRef::from_cells(&[&[0, 1]]));
        assert_eq!(pd.cell_offset(PrimitiveType::Verts), 0);
        assert_eq!(pd.cell_offset(PrimitiveType::Polys), 3);
    }
}
