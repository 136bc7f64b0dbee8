//! Free-format MPS reader and solution writer.

use std::{
    collections::{hash_map::Entry, HashMap},
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::Path,
};

use log::{debug, info};
use thiserror::Error;

use crate::{
    model::{Row, RowSense, VarType, Variable},
    problem::Problem,
};

#[derive(Debug, Error)]
pub enum MpsError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: unknown row '{name}'")]
    UnknownRow { line: usize, name: String },
    #[error("line {line}: unknown column '{name}'")]
    UnknownColumn { line: usize, name: String },
    #[error("line {line}: duplicate row '{name}'")]
    DuplicateRow { line: usize, name: String },
    #[error("line {line}: cannot parse number '{value}'")]
    InvalidNumber { line: usize, value: String },
    #[error("line {line}: unsupported {what}")]
    Unsupported { line: usize, what: String },
    #[error("missing ENDATA")]
    MissingEndata,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Start,
    ObjSense,
    Rows,
    Columns,
    Rhs,
    Ranges,
    Bounds,
}

#[derive(Debug, Clone, Copy)]
enum RowRef {
    Objective,
    /// Additional `N` rows are ignored.
    Free,
    Constraint(usize),
}

#[derive(Default)]
struct Reader {
    problem: Problem,
    rows: HashMap<String, RowRef>,
    columns: HashMap<String, usize>,
    objective_name: Option<String>,
    ranges: Vec<(usize, f64)>,
    integer_marker: bool,
}

fn number(line: usize, s: &str) -> Result<f64, MpsError> {
    s.parse::<f64>().map_err(|_| MpsError::InvalidNumber {
        line,
        value: s.to_string(),
    })
}

fn syntax(line: usize, message: impl Into<String>) -> MpsError {
    MpsError::Syntax {
        line,
        message: message.into(),
    }
}

impl Reader {
    fn row(&self, line: usize, name: &str) -> Result<RowRef, MpsError> {
        self.rows
            .get(name)
            .copied()
            .ok_or_else(|| MpsError::UnknownRow {
                line,
                name: name.to_string(),
            })
    }

    fn column(&self, line: usize, name: &str) -> Result<usize, MpsError> {
        self.columns
            .get(name)
            .copied()
            .ok_or_else(|| MpsError::UnknownColumn {
                line,
                name: name.to_string(),
            })
    }

    fn add_row(&mut self, line: usize, fields: &[&str]) -> Result<(), MpsError> {
        let [kind, name] = fields else {
            return Err(syntax(line, "expected row type and name"));
        };
        let row_ref = match *kind {
            "N" if self.objective_name.is_none() => {
                self.objective_name = Some(name.to_string());
                RowRef::Objective
            }
            "N" => RowRef::Free,
            "E" | "L" | "G" => {
                let sense = match *kind {
                    "E" => RowSense::Equal,
                    "L" => RowSense::Lte,
                    _ => RowSense::Gte,
                };
                let idx = self
                    .problem
                    .add_row(Row::new(sense, 0., Vec::new()).named(*name));
                RowRef::Constraint(idx)
            }
            other => return Err(syntax(line, format!("invalid row type '{other}'"))),
        };
        match self.rows.entry(name.to_string()) {
            Entry::Occupied(_) => Err(MpsError::DuplicateRow {
                line,
                name: name.to_string(),
            }),
            Entry::Vacant(e) => {
                e.insert(row_ref);
                Ok(())
            }
        }
    }

    fn add_column(&mut self, line: usize, fields: &[&str]) -> Result<(), MpsError> {
        if fields.get(1) == Some(&"'MARKER'") {
            match fields.get(2) {
                Some(&"'INTORG'") => self.integer_marker = true,
                Some(&"'INTEND'") => self.integer_marker = false,
                other => {
                    return Err(syntax(line, format!("invalid marker {other:?}")));
                }
            }
            return Ok(());
        }
        let Some((name, entries)) = fields.split_first() else {
            return Err(syntax(line, "expected column name"));
        };
        if entries.is_empty() || entries.len() % 2 != 0 {
            return Err(syntax(line, "expected row/value pairs"));
        }
        let var_type = if self.integer_marker {
            VarType::Integer
        } else {
            VarType::Continuous
        };
        let var = match self.columns.get(*name) {
            Some(&var) => var,
            None => {
                let var = self.problem.add_var(Variable {
                    name: Some(name.to_string()),
                    var_type,
                    lower: 0.,
                    upper: f64::INFINITY,
                    objective: 0.,
                });
                self.columns.insert(name.to_string(), var);
                var
            }
        };
        for pair in entries.chunks(2) {
            let value = number(line, pair[1])?;
            match self.row(line, pair[0])? {
                RowRef::Objective => self.problem.variables[var].objective += value,
                RowRef::Free => {}
                RowRef::Constraint(r) => self.problem.rows[r].coeffs.push((var, value)),
            }
        }
        Ok(())
    }

    /// `RHS` and `RANGES` lines: an optional set name, then row/value pairs.
    fn pairs<'f>(line: usize, fields: &'f [&'f str]) -> Result<&'f [&'f str], MpsError> {
        let pairs = if fields.len() % 2 == 1 {
            &fields[1..]
        } else {
            fields
        };
        if pairs.is_empty() {
            return Err(syntax(line, "expected row/value pairs"));
        }
        Ok(pairs)
    }

    fn add_rhs(&mut self, line: usize, fields: &[&str]) -> Result<(), MpsError> {
        for pair in Self::pairs(line, fields)?.chunks(2) {
            let value = number(line, pair[1])?;
            match self.row(line, pair[0])? {
                // objective constant c0 means minimizing c.x - c0
                RowRef::Objective => self.problem.objective_offset = -value,
                RowRef::Free => {}
                RowRef::Constraint(r) => self.problem.rows[r].rhs = value,
            }
        }
        Ok(())
    }

    fn add_range(&mut self, line: usize, fields: &[&str]) -> Result<(), MpsError> {
        for pair in Self::pairs(line, fields)?.chunks(2) {
            let value = number(line, pair[1])?;
            match self.row(line, pair[0])? {
                RowRef::Constraint(r) => self.ranges.push((r, value)),
                _ => return Err(syntax(line, "range on a free row")),
            }
        }
        Ok(())
    }

    fn add_bound(&mut self, line: usize, fields: &[&str]) -> Result<(), MpsError> {
        let (kind, column, value) = match fields {
            [kind, _set, column] => (*kind, *column, None),
            [kind, _set, column, value] => (*kind, *column, Some(number(line, value)?)),
            _ => return Err(syntax(line, "expected bound type, set, column [value]")),
        };
        let var = self.column(line, column)?;
        let needs_value = || value.ok_or_else(|| syntax(line, format!("{kind} bound needs a value")));
        let v = &mut self.problem.variables[var];
        match kind {
            "LO" => v.lower = needs_value()?,
            "UP" => {
                let x = needs_value()?;
                // a negative upper bound on a default lower bound frees the lower side
                if x < 0. && v.lower == 0. {
                    debug!("line {}: UP {} < 0 on '{}' sets its lower bound to -inf", line, x, column);
                    v.lower = f64::NEG_INFINITY;
                }
                v.upper = x;
            }
            "FX" => {
                let x = needs_value()?;
                v.lower = x;
                v.upper = x;
            }
            "FR" => {
                v.lower = f64::NEG_INFINITY;
                v.upper = f64::INFINITY;
            }
            "MI" => v.lower = f64::NEG_INFINITY,
            "PL" => v.upper = f64::INFINITY,
            "BV" => {
                v.var_type = VarType::Integer;
                v.lower = 0.;
                v.upper = 1.;
            }
            "LI" => {
                v.var_type = VarType::Integer;
                v.lower = needs_value()?;
            }
            "UI" => {
                v.var_type = VarType::Integer;
                v.upper = needs_value()?;
            }
            "SC" => {
                return Err(MpsError::Unsupported {
                    line,
                    what: "semi-continuous bound".to_string(),
                })
            }
            other => return Err(syntax(line, format!("invalid bound type '{other}'"))),
        }
        Ok(())
    }

    /// Ranged rows become a pair of inequalities.
    fn apply_ranges(&mut self) {
        for (r, range) in std::mem::take(&mut self.ranges) {
            let row = &self.problem.rows[r];
            let (lower, upper) = match row.sense {
                RowSense::Lte => (row.rhs - range.abs(), row.rhs),
                RowSense::Gte => (row.rhs, row.rhs + range.abs()),
                RowSense::Equal if range >= 0. => (row.rhs, row.rhs + range),
                RowSense::Equal => (row.rhs + range, row.rhs),
            };
            let coeffs = row.coeffs.clone();
            let name = row.name.clone();
            let row = &mut self.problem.rows[r];
            row.sense = RowSense::Gte;
            row.rhs = lower;
            let mut upper_row = Row::new(RowSense::Lte, upper, coeffs);
            upper_row.name = name.map(|n| format!("{n}_range"));
            self.problem.add_row(upper_row);
        }
    }
}

/// Only minimization is supported.
fn objective_sense(line: usize, sense: &str) -> Result<(), MpsError> {
    match sense {
        "MIN" | "MINIMIZE" => Ok(()),
        "MAX" | "MAXIMIZE" => Err(MpsError::Unsupported {
            line,
            what: "maximization".to_string(),
        }),
        other => Err(syntax(line, format!("invalid objective sense '{other}'"))),
    }
}

/// Parses an MPS model. The first `N` row is the objective.
pub fn parse(input: impl BufRead) -> Result<Problem, MpsError> {
    let mut reader = Reader::default();
    let mut section = Section::Start;

    for (idx, text) in input.lines().enumerate() {
        let text = text?;
        let line = idx + 1;
        if text.trim().is_empty() || text.starts_with('*') {
            continue;
        }
        let fields = text.split_ascii_whitespace().collect::<Vec<_>>();

        if !text.starts_with(|c: char| c.is_ascii_whitespace()) {
            section = match fields[0] {
                "NAME" => {
                    reader.problem.name = fields.get(1).copied().unwrap_or("unnamed").to_string();
                    Section::Start
                }
                "ROWS" => Section::Rows,
                "COLUMNS" => Section::Columns,
                "RHS" => Section::Rhs,
                "RANGES" => Section::Ranges,
                "BOUNDS" => Section::Bounds,
                "OBJSENSE" => match fields.get(1) {
                    Some(sense) => {
                        objective_sense(line, sense)?;
                        section
                    }
                    None => Section::ObjSense,
                },
                "ENDATA" => {
                    reader.apply_ranges();
                    info!(
                        "Read {}: {} variables, {} rows.",
                        reader.problem.name,
                        reader.problem.num_vars(),
                        reader.problem.rows.len()
                    );
                    return Ok(reader.problem);
                }
                other => return Err(syntax(line, format!("unknown section '{other}'"))),
            };
            debug!("MPS section {:?} at line {}", section, line);
            continue;
        }

        match section {
            Section::Start => return Err(syntax(line, "data before the first section")),
            Section::ObjSense => objective_sense(line, fields[0])?,
            Section::Rows => reader.add_row(line, &fields)?,
            Section::Columns => reader.add_column(line, &fields)?,
            Section::Rhs => reader.add_rhs(line, &fields)?,
            Section::Ranges => reader.add_range(line, &fields)?,
            Section::Bounds => reader.add_bound(line, &fields)?,
        }
    }
    Err(MpsError::MissingEndata)
}

/// Reads an MPS file, gunzipping it when the name ends in `.gz`.
pub fn read_file(path: &Path) -> Result<Problem, MpsError> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|e| e == "gz") {
        parse(BufReader::new(flate2::read::GzDecoder::new(file)))
    } else {
        parse(BufReader::new(file))
    }
}

/// Writes `# Objective value: <obj>` followed by one `name value` line per variable.
pub fn write_solution(
    mut out: impl Write,
    problem: &Problem,
    values: &[f64],
    objective: f64,
) -> io::Result<()> {
    writeln!(out, "# Objective value: {objective}")?;
    for (j, (var, value)) in problem.variables.iter().zip(values).enumerate() {
        match &var.name {
            Some(name) => writeln!(out, "{name} {value}")?,
            None => writeln!(out, "x{j} {value}")?,
        }
    }
    Ok(())
}
