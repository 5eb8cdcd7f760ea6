//! PyO3 wrapper for Account
//!
//! Mirrors the ledger interface the simulation's Python steps expect:
//! `add_transaction`, `iter_subaccounts`, `total_transactions_by_subacct`
//! and `to_frame`.

use pyo3::exceptions::{PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::models::{Account, SubaccountId, TransactionMetadata};

/// Python wrapper for a Rust Account
///
/// # Example (from Python)
///
/// ```python
/// from urban_subsidy_core import Account
///
/// acct = Account("obag_acct")
/// acct.add_transaction(1_000_000.0, 1, {"description": "OBAG regional subsidies", "year": 2015})
/// for subaccount, balance in acct.iter_subaccounts():
///     print(subaccount, balance)
/// ```
#[pyclass(name = "Account")]
pub struct PyAccount {
    inner: Account,
}

/// Accept `1` and `"1"` as the same subaccount
fn subaccount_key(value: &Bound<'_, PyAny>) -> PyResult<SubaccountId> {
    if let Ok(key) = value.extract::<String>() {
        return Ok(key);
    }
    if let Ok(key) = value.extract::<i64>() {
        return Ok(key.to_string());
    }
    Err(PyErr::new::<PyTypeError, _>(
        "subaccount must be a string or an integer",
    ))
}

/// Convert a metadata dict into typed metadata
///
/// Recognised keys: `description`, `year`, `building_id`,
/// `residential_units`. Other keys are ignored.
fn parse_metadata(metadata: Option<&Bound<'_, PyDict>>) -> PyResult<TransactionMetadata> {
    let Some(dict) = metadata else {
        return Ok(TransactionMetadata::new("", 0));
    };

    let description: String = match dict.get_item("description")? {
        Some(value) => value.extract()?,
        None => String::new(),
    };
    let year: u32 = match dict.get_item("year")? {
        Some(value) => value.extract()?,
        None => 0,
    };
    let mut parsed = TransactionMetadata::new(description, year);

    if let Some(value) = dict.get_item("building_id")? {
        parsed.building_id = Some(value.extract()?);
    }
    if let Some(value) = dict.get_item("residential_units")? {
        parsed.residential_units = Some(value.extract()?);
    }

    Ok(parsed)
}

#[pymethods]
impl PyAccount {
    #[new]
    fn new(name: String) -> Self {
        PyAccount {
            inner: Account::new(name),
        }
    }

    #[getter]
    fn name(&self) -> &str {
        self.inner.name()
    }

    /// Post a transaction and return its id
    ///
    /// # Errors
    ///
    /// Raises ValueError for a non-finite amount or an empty subaccount.
    #[pyo3(signature = (amount, subaccount, metadata=None))]
    fn add_transaction(
        &mut self,
        amount: f64,
        subaccount: &Bound<'_, PyAny>,
        metadata: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<String> {
        let key = subaccount_key(subaccount)?;
        let metadata = parse_metadata(metadata)?;

        let tx = self
            .inner
            .add_transaction(amount, key, metadata)
            .map_err(|e| PyErr::new::<PyValueError, _>(e.to_string()))?;
        Ok(tx.id().to_string())
    }

    /// `(subaccount, balance)` pairs in subaccount order
    fn iter_subaccounts(&self) -> Vec<(String, f64)> {
        self.inner
            .iter_subaccounts()
            .map(|(id, balance)| (id.to_string(), balance))
            .collect()
    }

    fn total_transactions_by_subacct(&self, subaccount: &Bound<'_, PyAny>) -> PyResult<f64> {
        Ok(self
            .inner
            .total_transactions_by_subacct(&subaccount_key(subaccount)?))
    }

    fn total_transactions(&self) -> f64 {
        self.inner.total_transactions()
    }

    /// Ledger rows as a list of dicts
    fn to_frame(&self, py: Python<'_>) -> PyResult<Py<PyList>> {
        let rows = PyList::empty_bound(py);
        for row in self.inner.to_frame() {
            let dict = PyDict::new_bound(py);
            dict.set_item("account", &row.account)?;
            dict.set_item("transaction_id", &row.transaction_id)?;
            dict.set_item("amount", row.amount)?;
            dict.set_item("subaccount", &row.subaccount)?;
            dict.set_item("description", &row.description)?;
            dict.set_item("year", row.year)?;
            dict.set_item("building_id", row.building_id)?;
            dict.set_item("residential_units", row.residential_units)?;
            rows.append(dict)?;
        }
        Ok(rows.unbind())
    }

    /// Serialize the account (transactions and balances) to JSON
    fn to_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.inner)
            .map_err(|e| PyErr::new::<PyValueError, _>(format!("Serialization failed: {}", e)))
    }

    fn __len__(&self) -> usize {
        self.inner.num_transactions()
    }

    fn __repr__(&self) -> String {
        format!(
            "Account(name={:?}, subaccounts={}, transactions={})",
            self.inner.name(),
            self.inner.num_subaccounts(),
            self.inner.num_transactions()
        )
    }
}
