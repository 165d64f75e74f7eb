use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Width of the patient identifier. Exports may drop leading zeros.
const PATIENT_ID_WIDTH: usize = 7;

const PATIENT_ID_COLUMN: usize = 0;
const COURSE_COLUMN: usize = 2;
const PLAN_COLUMN: usize = 3;

/// One row of the worklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklistEntry {
	pub patient_id: String,
	pub course_id: String,
	pub plan_id: String,
}

#[derive(Debug, Error)]
pub enum WorklistError {
	#[error("Failed to read worklist: {0}")]
	Csv(#[from] csv::Error),
	#[error("Row {row} has no column {column}")]
	MissingColumn { row: usize, column: usize },
}

/// Reads the worklist CSV at `path`. The header row is skipped.
/// At most `limit` rows are read if a limit is given.
pub fn read_worklist(path: &Path, limit: Option<usize>) -> Result<Vec<WorklistEntry>, WorklistError> {
	let reader = csv::ReaderBuilder::new()
		.has_headers(true)
		.flexible(true)
		.trim(csv::Trim::All)
		.from_path(path)?;
	parse(reader, limit)
}

fn parse<R: Read>(
	mut reader: csv::Reader<R>,
	limit: Option<usize>,
) -> Result<Vec<WorklistEntry>, WorklistError> {
	let mut entries = Vec::new();
	for (index, record) in reader
		.records()
		.take(limit.unwrap_or(usize::MAX))
		.enumerate()
	{
		let record = record?;
		// +2: one-based, after the header
		let row = index + 2;
		let column = |position: usize| {
			record
				.get(position)
				.map(str::to_owned)
				.ok_or(WorklistError::MissingColumn {
					row,
					column: position,
				})
		};

		entries.push(WorklistEntry {
			patient_id: format!("{:0>PATIENT_ID_WIDTH$}", column(PATIENT_ID_COLUMN)?),
			course_id: column(COURSE_COLUMN)?,
			plan_id: column(PLAN_COLUMN)?,
		});
	}
	Ok(entries)
}

#[cfg(test)]
mod tests {
	use super::*;

	const WORKLIST: &str = "\
PatientId,Name,Course,Plan
12345,A,C1,LUNG
0098765, B , C2 , LUNG_R
1234567,C,C1,LUNG
";

	fn reader(content: &'static str) -> csv::Reader<&'static [u8]> {
		csv::ReaderBuilder::new()
			.has_headers(true)
			.flexible(true)
			.trim(csv::Trim::All)
			.from_reader(content.as_bytes())
	}

	#[test]
	fn pads_patient_ids_and_selects_columns() {
		let entries = parse(reader(WORKLIST), None).unwrap();
		assert_eq!(entries.len(), 3);
		assert_eq!(
			entries[0],
			WorklistEntry {
				patient_id: String::from("0012345"),
				course_id: String::from("C1"),
				plan_id: String::from("LUNG"),
			}
		);
		assert_eq!(entries[1].patient_id, "0098765");
		assert_eq!(entries[1].course_id, "C2");
		assert_eq!(entries[1].plan_id, "LUNG_R");
		assert_eq!(entries[2].patient_id, "1234567");
	}

	#[test]
	fn respects_row_limit() {
		let entries = parse(reader(WORKLIST), Some(1)).unwrap();
		assert_eq!(entries.len(), 1);
		assert!(parse(reader(WORKLIST), Some(0)).unwrap().is_empty());
	}

	#[test]
	fn short_rows_are_rejected() {
		let err = parse(reader("id,name,course,plan\n1,A,C1\n"), None).unwrap_err();
		assert!(matches!(err, WorklistError::MissingColumn { row: 2, column: 3 }));
	}

	#[test]
	fn reads_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("worklist.csv");
		std::fs::write(&path, WORKLIST).unwrap();
		assert_eq!(read_worklist(&path, Some(2)).unwrap().len(), 2);
	}
}
