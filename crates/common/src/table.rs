//! Tabular test suite loading
//!
//! A suite is a header row followed by step rows. The core columns are
//! `CaseId, StepNo, Keyword, Locator, InputData, ExpectedResult`, optionally
//! followed by `Execute` and `Priority`. Column names are matched
//! case-insensitively; the core columns fall back to their fixed position
//! when the header does not name them.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{CaseId, StepNo, StepRecord};

const CASE_ID_HEADERS: &[&str] = &["testcaseid", "caseid", "testcase", "tcid"];
const STEP_NO_HEADERS: &[&str] = &["stepno", "step", "stepnumber"];
const KEYWORD_HEADERS: &[&str] = &["keyword", "action"];
const LOCATOR_HEADERS: &[&str] = &["locator", "selector"];
const INPUT_HEADERS: &[&str] = &["inputdata", "input", "data", "value"];
const EXPECTED_HEADERS: &[&str] = &["expectedresult", "expected"];
const EXECUTE_HEADERS: &[&str] = &["execute", "run"];
const PRIORITY_HEADERS: &[&str] = &["priority"];

/// Load every step row of a suite file.
///
/// `.csv` files are read as comma-separated text; `.xlsx`, `.xlsm`, `.xls`,
/// `.xlsb` and `.ods` workbooks are read from their first worksheet.
pub fn load_steps(path: &Path) -> Result<Vec<StepRecord>> {
    if !path.exists() {
        return Err(Error::SuiteNotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let rows = match extension.as_deref() {
        Some("csv") => read_csv(path)?,
        Some("xlsx" | "xlsm" | "xls" | "xlsb" | "ods") => read_workbook(path)?,
        _ => return Err(Error::UnsupportedFormat(path.to_path_buf())),
    };

    let table = StepTable::from_rows(rows)?;
    info!("Loaded {} step row(s) from {}", table.len(), path.display());
    Ok(table.into_records())
}

fn read_csv(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn read_workbook(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::EmptyWorkbook(path.to_path_buf()))??;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

/// Render a workbook cell the way it reads in the sheet
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // Spreadsheets store every number as a float; `1.0` is the id `1`
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Resolved positions of the suite columns
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnMap {
    /// Every case id column, in sheet order
    case_id: Vec<usize>,
    step_no: usize,
    keyword: usize,
    locator: usize,
    input_data: usize,
    expected_result: usize,
    execute: Option<usize>,
    priority: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &[String]) -> Self {
        let names: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));

        Self {
            case_id: {
                let columns: Vec<usize> = names
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| CASE_ID_HEADERS.contains(&n.as_str()))
                    .map(|(i, _)| i)
                    .collect();
                if columns.is_empty() {
                    vec![0]
                } else {
                    columns
                }
            },
            step_no: find(STEP_NO_HEADERS).unwrap_or(1),
            keyword: find(KEYWORD_HEADERS).unwrap_or(2),
            locator: find(LOCATOR_HEADERS).unwrap_or(3),
            input_data: find(INPUT_HEADERS).unwrap_or(4),
            expected_result: find(EXPECTED_HEADERS).unwrap_or(5),
            execute: find(EXECUTE_HEADERS),
            priority: find(PRIORITY_HEADERS),
        }
    }
}

fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Step rows of one suite, in source order
#[derive(Debug, Clone, Default)]
pub struct StepTable {
    records: Vec<StepRecord>,
}

impl StepTable {
    /// Build records from raw rows; the first row is the header.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Result<Self> {
        let mut rows = rows.into_iter();
        let header = rows
            .next()
            .ok_or_else(|| Error::InvalidTable("missing header row".to_string()))?;
        let columns = ColumnMap::from_header(&header);
        debug!("Resolved suite columns: {:?}", columns);

        let mut records = Vec::new();
        for (index, row) in rows.enumerate() {
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");
            let optional = |i: Option<usize>| {
                i.map(cell)
                    .filter(|v| !v.trim().is_empty())
                    .map(str::to_string)
            };

            let record = StepRecord {
                case_id: columns.case_id.iter().find_map(|&i| CaseId::new(cell(i))),
                step_no: StepNo::parse(cell(columns.step_no)),
                keyword: cell(columns.keyword).to_string(),
                locator: cell(columns.locator).to_string(),
                input_data: optional(Some(columns.input_data)),
                expected_result: optional(Some(columns.expected_result)),
                execute: optional(columns.execute),
                priority: optional(columns.priority),
                row: index + 2,
            };

            if record.case_id.is_none() {
                warn!("Row {} has no test case id and will not be selected", record.row);
            }
            records.push(record);
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test_case("TestCaseId" ; "camel id")]
    #[test_case("TestCaseID" ; "upper id")]
    #[test_case("Test Case ID" ; "spaced id")]
    fn test_case_id_header_aliases(header: &str) {
        let table = StepTable::from_rows(rows(&[
            &[header, "StepNo", "Keyword", "Locator", "InputData", "ExpectedResult"],
            &["TC_01", "1", "Click", "#login", "", ""],
        ]))
        .unwrap();
        assert_eq!(table.records()[0].case_id.as_ref().unwrap().as_str(), "TC_01");
    }

    #[test]
    fn test_duplicate_case_id_columns_coalesce() {
        let table = StepTable::from_rows(rows(&[
            &["TestCaseId", "StepNo", "Keyword", "Locator", "InputData", "ExpectedResult", "TestCaseID"],
            &["", "1", "Click", "#login", "", "", "TC_07"],
            &["TC_08", "1", "Click", "#login", "", "", "TC_99"],
        ]))
        .unwrap();
        assert_eq!(table.records()[0].case_id.as_ref().unwrap().as_str(), "TC_07");
        assert_eq!(table.records()[1].case_id.as_ref().unwrap().as_str(), "TC_08");
    }

    #[test]
    fn test_optional_columns_by_name() {
        let table = StepTable::from_rows(rows(&[
            &["Priority", "TestCaseID", "StepNo", "Keyword", "Locator", "InputData", "ExpectedResult", "Execute"],
            &["High", "TC_01", "2", "InputText", "#user", "alice", "filled", "Y"],
        ]))
        .unwrap();
        let record = &table.records()[0];
        assert_eq!(record.priority.as_deref(), Some("High"));
        assert_eq!(record.execute.as_deref(), Some("Y"));
        assert_eq!(record.keyword, "InputText");
        assert_eq!(record.input(), Some("alice"));
        assert_eq!(record.step_no, StepNo::Number(2));
        assert_eq!(record.row, 2);
    }

    #[test]
    fn test_positional_fallback_and_blank_rows() {
        let table = StepTable::from_rows(rows(&[
            &["id", "#", "kw", "where", "what", "expect"],
            &["7", "1", "Click", "#go", "wait:#done", ""],
            &["", "", "", "", "", ""],
            &["", "2", "Click", "#orphan", "", ""],
        ]))
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].input(), Some("wait:#done"));
        assert!(table.records()[0].expected_result.is_none());
        assert!(table.records()[1].case_id.is_none());
        assert_eq!(table.records()[1].row, 4);
    }

    #[test]
    fn test_missing_header_is_error() {
        assert!(matches!(
            StepTable::from_rows(vec![]),
            Err(Error::InvalidTable(_))
        ));
    }

    #[test]
    fn test_load_csv_suite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.csv");
        std::fs::write(
            &path,
            "TestCaseID,StepNo,Keyword,Locator,InputData,ExpectedResult\n\
             TC_02,1,Click,#a,,\n\
             TC_01,1,InputText,#b,\"hello, world\",\n",
        )
        .unwrap();

        let records = load_steps(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].input(), Some("hello, world"));
    }

    #[test]
    fn test_unsupported_and_missing_suites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.txt");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(load_steps(&path), Err(Error::UnsupportedFormat(_))));
        assert!(matches!(
            load_steps(&dir.path().join("absent.xlsx")),
            Err(Error::SuiteNotFound(_))
        ));
    }
}
