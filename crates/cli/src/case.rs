//! Case files (JSON) and electrode coordinate tables (CSV).

use anyhow::{bail, Context, Result};
use brainshift::synth::SyntheticCase;
use brainshift::{Affine3, Mesh, Point3};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HemisphereFile {
    pub vertices: Vec<[f64; 3]>,
    #[serde(default)]
    pub triangles: Vec<[usize; 3]>,
}

/// One subject's inputs: electrodes, surface, surface→electrode affine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub electrodes: Option<Vec<[f64; 3]>>,
    /// Usually `[left, right]`; merged in order.
    pub hemispheres: Vec<HemisphereFile>,
    /// Row-major 4×4; identity when absent.
    #[serde(default = "identity_rows")]
    pub affine: [[f64; 4]; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_shape: Option<[usize; 3]>,
}

fn identity_rows() -> [[f64; 4]; 4] {
    Affine3::identity().to_rows()
}

impl CaseFile {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading case {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parsing case {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)
            .with_context(|| format!("writing case {}", path.display()))
    }

    pub fn from_synthetic(case: &SyntheticCase, volume_shape: Option<[usize; 3]>) -> Self {
        let hemi = |m: &Mesh| HemisphereFile {
            vertices: m.vertices().iter().map(|v| [v.x, v.y, v.z]).collect(),
            triangles: m.triangles().to_vec(),
        };
        Self {
            electrodes: Some(case.electrodes.iter().map(|p| [p.x, p.y, p.z]).collect()),
            hemispheres: case.hemispheres.iter().map(hemi).collect(),
            affine: case.surface_to_electrode.to_rows(),
            volume_shape,
        }
    }

    pub fn electrodes(&self) -> Option<Vec<Point3>> {
        self.electrodes.as_ref().map(|e| e.iter().map(to_point).collect())
    }

    /// All hemispheres merged into one validated mesh (surface space).
    pub fn surface(&self) -> Result<Mesh> {
        if self.hemispheres.is_empty() {
            bail!("case has no hemispheres");
        }
        let mut merged = Mesh::default();
        for (k, h) in self.hemispheres.iter().enumerate() {
            let mesh = Mesh::new(h.vertices.iter().map(to_point).collect(), h.triangles.clone())
                .with_context(|| format!("hemisphere {k}"))?;
            merged = Mesh::merge_hemispheres(&merged, &mesh);
        }
        Ok(merged)
    }

    pub fn surface_to_electrode(&self) -> Affine3 {
        Affine3::from_rows(self.affine)
    }
}

#[inline]
fn to_point(p: &[f64; 3]) -> Point3 {
    Point3::new(p[0], p[1], p[2])
}

/// Read an N×3 coordinate table; every column is cast to `f64`.
pub fn read_points_csv(path: &Path, has_header: bool, separator: u8) -> Result<Vec<Point3>> {
    let df = LazyCsvReader::new(path)
        .with_has_header(has_header)
        .with_separator(separator)
        .with_infer_schema_length(Some(100))
        .finish()
        .and_then(|lf| lf.collect())
        .with_context(|| format!("reading electrodes {}", path.display()))?;
    if df.width() != 3 {
        bail!(
            "{}: expected 3 coordinate columns, found {}",
            path.display(),
            df.width()
        );
    }
    let mut cols = Vec::with_capacity(3);
    for s in df.get_columns() {
        let s = s.cast(&DataType::Float64)?;
        let values: Option<Vec<f64>> = s.f64()?.into_iter().collect();
        match values {
            Some(v) => cols.push(v),
            None => bail!("{}: column {} has missing values", path.display(), s.name()),
        }
    }
    Ok((0..df.height())
        .map(|i| Point3::new(cols[0][i], cols[1][i], cols[2][i]))
        .collect())
}

/// Write points as an `x,y,z` table with header.
pub fn write_points_csv(path: &Path, points: &[Point3]) -> Result<()> {
    let mut df = df!(
        "x" => points.iter().map(|p| p.x).collect::<Vec<_>>(),
        "y" => points.iter().map(|p| p.y).collect::<Vec<_>>(),
        "z" => points.iter().map(|p| p.z).collect::<Vec<_>>()
    )?;
    let mut file =
        fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainshift::synth::{draw_case, ReplayToken, SynthCfg};
    use tempfile::tempdir;

    #[test]
    fn csv_round_trip_with_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e.csv");
        let pts = vec![Point3::new(1.5, -2.0, 3.25), Point3::new(0.0, 10.0, 7.0)];
        write_points_csv(&path, &pts).unwrap();
        let back = read_points_csv(&path, true, b',').unwrap();
        assert_eq!(back, pts);
    }

    #[test]
    fn headerless_table_with_custom_separator() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e.txt");
        fs::write(&path, "1;2;3\n4;5;6\n").unwrap();
        let back = read_points_csv(&path, false, b';').unwrap();
        assert_eq!(back, vec![Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 5.0, 6.0)]);
    }

    #[test]
    fn wrong_column_count_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e.csv");
        fs::write(&path, "x,y\n1,2\n").unwrap();
        let err = read_points_csv(&path, true, b',').unwrap_err();
        assert!(err.to_string().contains("3 coordinate columns"), "{err}");
    }

    #[test]
    fn case_round_trips_and_merges() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("case.json");
        let synth = draw_case(&SynthCfg::default(), ReplayToken::new(5));
        CaseFile::from_synthetic(&synth, Some([100, 60, 20])).save(&path).unwrap();
        let case = CaseFile::load(&path).unwrap();
        assert_eq!(case.volume_shape, Some([100, 60, 20]));
        let electrodes = case.electrodes().unwrap();
        assert_eq!(electrodes.len(), synth.electrodes.len());
        for (a, b) in electrodes.iter().zip(&synth.electrodes) {
            assert!((a - b).norm() < 1e-12);
        }
        let surface = case.surface().unwrap();
        assert_eq!(surface.vertex_count(), synth.merged_surface().vertex_count());
        assert_eq!(case.surface_to_electrode(), synth.surface_to_electrode);
    }

    #[test]
    fn missing_affine_defaults_to_identity() {
        let case: CaseFile = serde_json::from_str(
            r#"{"hemispheres": [{"vertices": [[0,0,0],[1,0,0],[0,1,0]], "triangles": [[0,1,2]]}]}"#,
        )
        .unwrap();
        assert_eq!(case.surface_to_electrode(), Affine3::identity());
        assert!(case.electrodes().is_none());
        assert_eq!(case.surface().unwrap().vertex_count(), 3);
    }

    #[test]
    fn dangling_triangle_names_hemisphere() {
        let case: CaseFile = serde_json::from_str(
            r#"{"hemispheres": [{"vertices": [[0,0,0]], "triangles": []},
                                {"vertices": [[0,0,0]], "triangles": [[0,0,4]]}]}"#,
        )
        .unwrap();
        let err = case.surface().unwrap_err();
        assert!(format!("{err:#}").contains("hemisphere 1"), "{err:#}");
    }
}
