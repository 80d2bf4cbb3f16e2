//! Label table filtering: keeps two class codes of a `ImageId,ClassType,MultipolygonWKT`
//! table, renumbered to 1 and 2, and drops the rest.

use std::{
  fs::File,
  io::{BufReader, BufWriter, Read, Write},
  path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const HEADER: [&str; 3] = ["ImageId", "ClassType", "MultipolygonWKT"];

/// `(source class, target class)` pairs, every other class is dropped.
pub const CLASS_REMAP: [(u32, u32); 2] = [(6, 1), (7, 2)];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRow {
  #[serde(rename = "ImageId")]
  pub image_id: String,
  #[serde(rename = "ClassType")]
  pub class_type: u32,
  #[serde(rename = "MultipolygonWKT")]
  pub multipolygon_wkt: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemapStats {
  pub read: usize,
  pub kept: usize,
}

pub fn remap_class(class_type: u32) -> Option<u32> {
  CLASS_REMAP
    .iter()
    .find(|(from, _)| *from == class_type)
    .map(|&(_, to)| to)
}

pub fn remap_row(row: LabelRow) -> Option<LabelRow> {
  remap_class(row.class_type).map(|class_type| LabelRow { class_type, ..row })
}

pub fn remap_labels<R: Read, W: Write>(reader: R, writer: W) -> Result<RemapStats> {
  let mut reader = csv::Reader::from_reader(reader);
  let mut writer = csv::WriterBuilder::new()
    .has_headers(false)
    .from_writer(writer);

  writer.write_record(HEADER)?;

  let mut stats = RemapStats::default();
  for row in reader.deserialize::<LabelRow>() {
    stats.read += 1;
    if let Some(row) = remap_row(row?) {
      writer.serialize(row)?;
      stats.kept += 1;
    }
  }

  writer.flush()?;
  Ok(stats)
}

pub fn remap_label_file(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<RemapStats> {
  let input = input.as_ref();
  let output = output.as_ref();

  let stats = remap_labels(
    BufReader::new(File::open(input)?),
    BufWriter::new(File::create(output)?),
  )?;

  tracing::info!(
    "Kept {} of {} label rows from {} in {}",
    stats.kept,
    stats.read,
    input.display(),
    output.display()
  );

  Ok(stats)
}

#[cfg(test)]
mod tests {
  use super::*;

  const POLY: &str = "MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)))";

  fn run(input: &str) -> (RemapStats, String) {
    let mut out = Vec::new();
    let stats = remap_labels(input.as_bytes(), &mut out).unwrap();
    (stats, String::from_utf8(out).unwrap())
  }

  #[test]
  fn keeps_and_renumbers_two_classes() {
    let input = format!(
      "ImageId,ClassType,MultipolygonWKT\n\
       img1,6,\"{POLY}\"\n\
       img1,7,\"{POLY}\"\n\
       img1,3,\"{POLY}\"\n"
    );
    let (stats, output) = run(&input);

    assert_eq!(stats, RemapStats { read: 3, kept: 2 });

    let rows: Vec<LabelRow> = csv::Reader::from_reader(output.as_bytes())
      .deserialize()
      .collect::<std::result::Result<_, _>>()
      .unwrap();
    assert_eq!(
      rows,
      vec![
        LabelRow {
          image_id: "img1".to_owned(),
          class_type: 1,
          multipolygon_wkt: POLY.to_owned(),
        },
        LabelRow {
          image_id: "img1".to_owned(),
          class_type: 2,
          multipolygon_wkt: POLY.to_owned(),
        },
      ]
    );
  }

  #[test]
  fn header_written_without_rows() {
    let (stats, output) = run("ImageId,ClassType,MultipolygonWKT\nimg9,1,MULTIPOLYGON EMPTY\n");

    assert_eq!(stats, RemapStats { read: 1, kept: 0 });
    assert_eq!(output, "ImageId,ClassType,MultipolygonWKT\n");
  }

  #[test]
  fn remap_class_table() {
    assert_eq!(remap_class(6), Some(1));
    assert_eq!(remap_class(7), Some(2));
    assert_eq!((1..=10).filter_map(remap_class).count(), 2);
  }

  #[test]
  fn malformed_class_is_an_error() {
    let mut out = Vec::new();
    assert!(remap_labels("ImageId,ClassType,MultipolygonWKT\nimg1,six,x\n".as_bytes(), &mut out).is_err());
  }

  #[test]
  fn remaps_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("train_wkt_full.csv");
    let output = dir.path().join("train_wkt.csv");
    std::fs::write(
      &input,
      format!("ImageId,ClassType,MultipolygonWKT\nimg2,7,\"{POLY}\"\n"),
    )
    .unwrap();

    let stats = remap_label_file(&input, &output).unwrap();
    assert_eq!(stats.kept, 1);
    assert_eq!(
      std::fs::read_to_string(&output).unwrap(),
      format!("ImageId,ClassType,MultipolygonWKT\nimg2,2,\"{POLY}\"\n")
    );
  }
}
