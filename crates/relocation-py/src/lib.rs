//! Python bindings for the section relocation parser.

use pyo3::create_exception;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use relocation_core::{
    emit, NameError, ParseError as CoreParseError, Parser, Relocated as CoreRelocated,
};

create_exception!(
    pyreloc,
    RelocationError,
    PyValueError,
    "Raised for malformed markers and invalid section names."
);

fn parse_err(e: CoreParseError) -> PyErr {
    RelocationError::new_err(format!("{} [{}]", e, e.kind().as_str()))
}

fn name_err(e: NameError) -> PyErr {
    RelocationError::new_err(e.to_string())
}

// ============================================================================
// Relocated
// ============================================================================

/// A parsed document: the main buffer plus its named sections.
///
/// Sections injected into the main buffer are live: rewriting a section
/// changes every place it was injected.
#[pyclass(name = "Relocated")]
pub struct PyRelocated {
    inner: CoreRelocated<'static>,
}

#[pymethods]
impl PyRelocated {
    /// Main buffer with every section injected.
    #[getter]
    fn main(&self) -> String {
        self.inner.main().flatten()
    }

    /// Number of markers consumed while parsing.
    #[getter]
    fn markers(&self) -> usize {
        self.inner.markers()
    }

    /// Dict of section name to its current content.
    fn sections<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new(py);
        for (name, section) in self.inner.sections() {
            dict.set_item(name, section.flatten())?;
        }
        Ok(dict)
    }

    /// Content of one section, or None.
    #[pyo3(text_signature = "(self, name)")]
    fn section(&self, name: &str) -> Option<String> {
        self.inner.section(name).map(|s| s.flatten())
    }

    /// Replace a section's content. Returns False if the section is unknown.
    #[pyo3(text_signature = "(self, name, text)")]
    fn replace_section(&mut self, name: &str, text: String) -> bool {
        self.inner.replace_section(name, text)
    }

    /// Append to a section, creating it if needed.
    #[pyo3(text_signature = "(self, name, text)")]
    fn append_section(&mut self, name: &str, text: String) {
        self.inner.ensure_section(name).append_back(text);
    }

    /// Empty a section. Returns False if the section is unknown.
    #[pyo3(text_signature = "(self, name)")]
    fn clear_section(&mut self, name: &str) -> bool {
        match self.inner.section_mut(name) {
            Some(mut section) => {
                section.clear();
                true
            }
            None => false,
        }
    }

    /// Render the final document.
    fn render(&self) -> String {
        self.inner.render()
    }

    fn __contains__(&self, name: &str) -> bool {
        self.inner.contains_section(name)
    }

    fn __str__(&self) -> String {
        self.inner.render()
    }

    fn __repr__(&self) -> String {
        let names: Vec<&str> = self.inner.sections().map(|(name, _)| name).collect();
        format!(
            "Relocated(markers={}, sections={:?})",
            self.inner.markers(),
            names
        )
    }
}

// ============================================================================
// Module functions
// ============================================================================

/// Marker opening a capture block for `name`.
///
/// Raises:
///     RelocationError: If the name is too long or contains '>'
#[pyfunction]
#[pyo3(text_signature = "(name)")]
fn begin_section(name: &str) -> PyResult<String> {
    emit::begin_section(name).map_err(name_err)
}

/// Marker closing the innermost capture block.
#[pyfunction]
fn end_section() -> String {
    emit::end_section()
}

/// Marker injecting section `name` at this point.
#[pyfunction]
#[pyo3(text_signature = "(name)")]
fn inject_here(name: &str) -> PyResult<String> {
    emit::inject_here(name).map_err(name_err)
}

/// Parse a rendered document.
///
/// Args:
///     document: Rendered template output
///     allow_unclosed: Accept section blocks that are never closed
///
/// Returns:
///     Relocated: Parsed main buffer and sections
///
/// Raises:
///     RelocationError: On malformed or unbalanced markers
#[pyfunction]
#[pyo3(signature = (document, allow_unclosed=false), text_signature = "(document, allow_unclosed=False)")]
fn deserialize(document: &str, allow_unclosed: bool) -> PyResult<PyRelocated> {
    let parser = Parser::new().allow_unclosed_sections(allow_unclosed);
    let relocated = parser.parse(document).map_err(parse_err)?;
    Ok(PyRelocated {
        inner: relocated.into_owned(),
    })
}

/// Parse a rendered document and return it with every section relocated.
#[pyfunction]
#[pyo3(text_signature = "(document)")]
fn do_relocation(document: &str) -> PyResult<String> {
    relocation_core::do_relocation(document).map_err(parse_err)
}

// ============================================================================
// Module
// ============================================================================

/// pyreloc - move template sections to where they are injected.
#[pymodule]
fn pyreloc(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("MAGIC", relocation_core::MAGIC)?;
    m.add("MAX_NAME_LEN", relocation_core::MAX_NAME_LEN)?;
    m.add("RelocationError", m.py().get_type::<RelocationError>())?;
    m.add_class::<PyRelocated>()?;
    m.add_function(wrap_pyfunction!(begin_section, m)?)?;
    m.add_function(wrap_pyfunction!(end_section, m)?)?;
    m.add_function(wrap_pyfunction!(inject_here, m)?)?;
    m.add_function(wrap_pyfunction!(deserialize, m)?)?;
    m.add_function(wrap_pyfunction!(do_relocation, m)?)?;
    Ok(())
}
