//! Compiled artifacts: predicates and update-set assignments compiled once,
//! ahead of time, from a table's schema, and evaluated many times on the
//! hot path.
//!
//! The streaming query compiler that would normally emit predicate and
//! update-set ASTs is out of scope here; this crate supplies a minimal AST
//! of its own (column references, literals, comparisons, and boolean
//! connectives), just rich enough to exercise the "compile once, evaluate
//! many" discipline end-to-end.

use std::cmp::Ordering;
use std::sync::Arc;

use table_errors::{TableError, TableResult};
use table_schema::{CellValue, ColumnType, Row, StateEvent, TableDefinition};

/// A reference to a single value used inside a [`Predicate`] or
/// [`ValueExpr`].
#[derive(Clone, Debug, PartialEq)]
pub enum ValueRef {
    /// A column of the row being tested/updated.
    Column(usize),
    /// A column of the incoming matching event (`StateEvent::matching`).
    MatchingColumn(usize),
    /// A constant.
    Literal(CellValue),
}

/// An uncompiled predicate AST, standing in for what the query compiler
/// would otherwise hand to `compile_condition`.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Eq(ValueRef, ValueRef),
    Ne(ValueRef, ValueRef),
    Lt(ValueRef, ValueRef),
    Le(ValueRef, ValueRef),
    Gt(ValueRef, ValueRef),
    Ge(ValueRef, ValueRef),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

fn validate_value_ref(
    vr: &ValueRef,
    table_def: &TableDefinition,
    matching_arity: usize,
    table_id: &str,
) -> TableResult<()> {
    match vr {
        ValueRef::Column(i) => {
            if *i >= table_def.columns.len() {
                return Err(TableError::Compile {
                    table_id: table_id.to_string(),
                    message: format!(
                        "column index {i} out of bounds for table with {} columns",
                        table_def.columns.len()
                    ),
                });
            }
        }
        ValueRef::MatchingColumn(i) => {
            if *i >= matching_arity {
                return Err(TableError::Compile {
                    table_id: table_id.to_string(),
                    message: format!(
                        "matching-event column index {i} out of bounds for arity {matching_arity}"
                    ),
                });
            }
        }
        ValueRef::Literal(_) => {}
    }
    Ok(())
}

fn validate_predicate(
    predicate: &Predicate,
    table_def: &TableDefinition,
    matching_arity: usize,
    table_id: &str,
) -> TableResult<()> {
    match predicate {
        Predicate::Eq(a, b)
        | Predicate::Ne(a, b)
        | Predicate::Lt(a, b)
        | Predicate::Le(a, b)
        | Predicate::Gt(a, b)
        | Predicate::Ge(a, b) => {
            validate_value_ref(a, table_def, matching_arity, table_id)?;
            validate_value_ref(b, table_def, matching_arity, table_id)?;
        }
        Predicate::And(a, b) | Predicate::Or(a, b) => {
            validate_predicate(a, table_def, matching_arity, table_id)?;
            validate_predicate(b, table_def, matching_arity, table_id)?;
        }
        Predicate::Not(a) => validate_predicate(a, table_def, matching_arity, table_id)?,
    }
    Ok(())
}

/// An opaque predicate bound to exactly one [`TableDefinition`] and one
/// matching-event arity. Produced once by [`compile_condition`], evaluated
/// many times.
///
/// Evaluating a `CompiledCondition` against a row or matching event whose
/// shape differs from what it was compiled for is undefined behavior; debug
/// builds assert the shapes match, but release builds trust the caller,
/// since the whole point of compiling ahead of time is to avoid hot-path
/// validation work.
#[derive(Clone, Debug)]
pub struct CompiledCondition {
    predicate: Predicate,
    table_columns: usize,
    matching_arity: usize,
}

/// Compiles `predicate` against `table_def` and a matching-event arity,
/// validating every column reference once. Returns a
/// [`TableError::Compile`] if any referenced column is out of bounds;
/// never at evaluation time.
pub fn compile_condition(
    predicate: Predicate,
    table_def: &TableDefinition,
    matching_arity: usize,
) -> TableResult<CompiledCondition> {
    validate_predicate(&predicate, table_def, matching_arity, &table_def.id)?;
    Ok(CompiledCondition {
        predicate,
        table_columns: table_def.columns.len(),
        matching_arity,
    })
}

fn resolve<'a>(vr: &'a ValueRef, row: &'a Row, matching: &'a Row) -> &'a CellValue {
    match vr {
        ValueRef::Column(i) => &row[*i],
        ValueRef::MatchingColumn(i) => &matching[*i],
        ValueRef::Literal(v) => v,
    }
}

fn compare(a: &CellValue, b: &CellValue) -> Option<Ordering> {
    use CellValue::*;
    match (a, b) {
        (Bool(a), Bool(b)) => a.partial_cmp(b),
        (Int(a), Int(b)) => a.partial_cmp(b),
        (BigInt(a), BigInt(b)) => a.partial_cmp(b),
        (Float(a), Float(b)) => a.partial_cmp(b),
        (Double(a), Double(b)) => a.partial_cmp(b),
        (Text(a), Text(b)) => a.partial_cmp(b),
        (Timestamp(a), Timestamp(b)) => a.partial_cmp(b),
        (Null, Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn eval_predicate(predicate: &Predicate, row: &Row, matching: &Row) -> bool {
    match predicate {
        Predicate::Eq(a, b) => compare(resolve(a, row, matching), resolve(b, row, matching))
            == Some(Ordering::Equal),
        Predicate::Ne(a, b) => {
            compare(resolve(a, row, matching), resolve(b, row, matching)) != Some(Ordering::Equal)
        }
        Predicate::Lt(a, b) => compare(resolve(a, row, matching), resolve(b, row, matching))
            == Some(Ordering::Less),
        Predicate::Le(a, b) => {
            matches!(
                compare(resolve(a, row, matching), resolve(b, row, matching)),
                Some(Ordering::Less) | Some(Ordering::Equal)
            )
        }
        Predicate::Gt(a, b) => compare(resolve(a, row, matching), resolve(b, row, matching))
            == Some(Ordering::Greater),
        Predicate::Ge(a, b) => {
            matches!(
                compare(resolve(a, row, matching), resolve(b, row, matching)),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            )
        }
        Predicate::And(a, b) => eval_predicate(a, row, matching) && eval_predicate(b, row, matching),
        Predicate::Or(a, b) => eval_predicate(a, row, matching) || eval_predicate(b, row, matching),
        Predicate::Not(a) => !eval_predicate(a, row, matching),
    }
}

impl CompiledCondition {
    /// Evaluates this condition against a candidate row and the matching
    /// event driving the lookup. Deterministic, side-effect free, and cheap
    /// relative to compilation.
    pub fn evaluate(&self, row: &Row, matching: &Row) -> bool {
        debug_assert_eq!(row.len(), self.table_columns);
        debug_assert_eq!(matching.len(), self.matching_arity);
        eval_predicate(&self.predicate, row, matching)
    }
}

/// An uncompiled (column name, expression) assignment, standing in for what
/// the query compiler would hand to `compile_update_set`.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub expr: ValueRef,
}

impl Assignment {
    pub fn new(column: impl Into<String>, expr: ValueRef) -> Self {
        Self {
            column: column.into(),
            expr,
        }
    }
}

fn literal_matches_column_type(value: &CellValue, ty: ColumnType) -> bool {
    matches!(
        (value, ty),
        (CellValue::Null, _)
            | (CellValue::Bool(_), ColumnType::Bool)
            | (CellValue::Int(_), ColumnType::Int)
            | (CellValue::BigInt(_), ColumnType::BigInt)
            | (CellValue::Float(_), ColumnType::Float)
            | (CellValue::Double(_), ColumnType::Double)
            | (CellValue::Text(_), ColumnType::Text)
            | (CellValue::Timestamp(_), ColumnType::Timestamp)
    )
}

/// A single compiled (column-index, value-expression-plan) pair.
#[derive(Clone, Debug)]
struct CompiledAssignment {
    column_index: usize,
    expr: ValueRef,
}

/// A sequence of (column-index, value-expression-plan) pairs, opaque and
/// immutable post-compilation.
#[derive(Clone, Debug)]
pub struct CompiledUpdateSet {
    assignments: Vec<CompiledAssignment>,
}

/// Compiles `update_set` against `table_def` and a matching-event arity.
/// Column names are resolved to indices once; missing columns, out-of-bounds
/// references, and literal/column type mismatches all fail compilation with
/// a descriptive error rather than at runtime.
pub fn compile_update_set(
    update_set: Vec<Assignment>,
    table_def: &TableDefinition,
    matching_arity: usize,
) -> TableResult<CompiledUpdateSet> {
    let mut assignments = Vec::with_capacity(update_set.len());
    for Assignment { column, expr } in update_set {
        let column_index = table_def.column_index(&column).ok_or_else(|| TableError::Compile {
            table_id: table_def.id.clone(),
            message: format!("no column named `{column}` in table `{}`", table_def.id),
        })?;
        validate_value_ref(&expr, table_def, matching_arity, &table_def.id)?;
        if let ValueRef::Literal(value) = &expr {
            let target_ty = table_def.columns[column_index].ty;
            if !literal_matches_column_type(value, target_ty) {
                return Err(TableError::Compile {
                    table_id: table_def.id.clone(),
                    message: format!(
                        "literal {value} is not compatible with column `{column}` of type {target_ty:?}"
                    ),
                });
            }
        }
        assignments.push(CompiledAssignment { column_index, expr });
    }
    Ok(CompiledUpdateSet { assignments })
}

impl CompiledUpdateSet {
    /// Evaluates this update set against the row being updated and the
    /// state event driving the update, yielding the concrete new
    /// (column-index, value) pairs.
    pub fn evaluate(&self, existing: &Row, state: &StateEvent) -> Vec<(usize, CellValue)> {
        self.assignments
            .iter()
            .map(|a| {
                let value = resolve(&a.expr, existing, &state.matching).clone();
                (a.column_index, value)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// A small pure function, embedded in `update_or_add` calls, that yields the
/// stream event (row) to insert when no row matches the condition. Treated
/// as immutable data.
#[derive(Clone)]
pub struct AddingStreamEventExtractor(Arc<dyn Fn(&StateEvent) -> Row + Send + Sync>);

impl AddingStreamEventExtractor {
    pub fn new(f: impl Fn(&StateEvent) -> Row + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn extract(&self, state: &StateEvent) -> Row {
        (self.0)(state)
    }
}

impl std::fmt::Debug for AddingStreamEventExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AddingStreamEventExtractor(..)")
    }
}
