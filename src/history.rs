use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};

use crate::error::RecordError;
use crate::models::{SemesterRecord, StudentHistory};

/// Parses `GPA,CREDITS,PASSED` as given on the command line.
pub fn parse_record(value: &str) -> Result<SemesterRecord, RecordError> {
    let malformed = || RecordError::Malformed(value.to_string());
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [gpa, credits, passed] = parts.as_slice() else {
        return Err(malformed());
    };
    let gpa: f64 = gpa.parse().map_err(|_| malformed())?;
    let credits: u32 = credits.parse().map_err(|_| malformed())?;
    let passed: u32 = passed.parse().map_err(|_| malformed())?;
    SemesterRecord::new(gpa, credits, passed)
}

pub fn read_roster(csv_path: &Path) -> anyhow::Result<Vec<StudentHistory>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    read_roster_from(file).with_context(|| format!("invalid roster {}", csv_path.display()))
}

/// Groups roster rows into one history per student.
///
/// Students keep the order they first appear in; each student's records are
/// ordered by their `semester` column.
pub fn read_roster_from<R: Read>(reader: R) -> anyhow::Result<Vec<StudentHistory>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_id: String,
        current_semester: u32,
        semester: u32,
        gpa: f64,
        credits: u32,
        passed: u32,
    }

    let mut reader = csv::Reader::from_reader(reader);
    let mut students: Vec<(StudentHistory, Vec<u32>)> = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("line {line}"))?;
        let record = SemesterRecord::new(row.gpa, row.credits, row.passed)
            .with_context(|| format!("line {line}: student {}", row.student_id))?;

        let position = students
            .iter()
            .position(|(student, _)| student.student_id == row.student_id);
        let (student, semesters) = match position {
            Some(position) => &mut students[position],
            None => {
                students.push((
                    StudentHistory {
                        student_id: row.student_id.clone(),
                        current_semester: row.current_semester,
                        records: Vec::new(),
                    },
                    Vec::new(),
                ));
                let last = students.len() - 1;
                &mut students[last]
            }
        };

        if student.current_semester != row.current_semester {
            bail!(
                "line {line}: student {} has conflicting current semesters {} and {}",
                row.student_id,
                student.current_semester,
                row.current_semester
            );
        }
        if semesters.contains(&row.semester) {
            bail!(
                "line {line}: student {} lists semester {} twice",
                row.student_id,
                row.semester
            );
        }
        student.records.push(record);
        semesters.push(row.semester);
    }

    Ok(students
        .into_iter()
        .map(|(mut student, semesters)| {
            let mut ordered: Vec<(u32, SemesterRecord)> =
                semesters.into_iter().zip(student.records).collect();
            ordered.sort_by_key(|(semester, _)| *semester);
            student.records = ordered.into_iter().map(|(_, record)| record).collect();
            student
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inline_record() {
        let record = parse_record("3.25, 21, 18").unwrap();
        assert_eq!(record.grade_point_average, 3.25);
        assert_eq!(record.credits_attempted, 21);
        assert_eq!(record.credits_passed, 18);
    }

    #[test]
    fn rejects_bad_inline_records() {
        assert!(matches!(parse_record("3.2,20"), Err(RecordError::Malformed(_))));
        assert!(matches!(parse_record("abc,20,20"), Err(RecordError::Malformed(_))));
        assert!(matches!(parse_record("4.5,20,20"), Err(RecordError::GpaOutOfRange(_))));
        assert!(matches!(
            parse_record("3.0,18,20"),
            Err(RecordError::PassedExceedsAttempted {
                passed: 20,
                attempted: 18
            })
        ));
    }

    #[test]
    fn groups_and_orders_roster_rows() {
        let csv = "\
student_id,current_semester,semester,gpa,credits,passed
S-002,3,2,2.9,20,14
S-001,2,1,3.6,20,20
S-002,3,1,3.1,20,20
";
        let students = read_roster_from(csv.as_bytes()).unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].student_id, "S-002");
        assert_eq!(students[0].current_semester, 3);
        let gpas: Vec<f64> = students[0]
            .records
            .iter()
            .map(|r| r.grade_point_average)
            .collect();
        assert_eq!(gpas, vec![3.1, 2.9]);
        assert_eq!(students[1].records.len(), 1);
    }

    #[test]
    fn rejects_conflicting_current_semester() {
        let csv = "\
student_id,current_semester,semester,gpa,credits,passed
S-001,3,1,3.0,20,20
S-001,4,2,3.0,20,20
";
        let err = read_roster_from(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("conflicting current semesters"));
    }

    #[test]
    fn rejects_invalid_record_rows() {
        let csv = "\
student_id,current_semester,semester,gpa,credits,passed
S-001,2,1,3.0,18,20
";
        let err = read_roster_from(csv.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("exceed credits attempted"));
    }
}
