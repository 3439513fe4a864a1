//! Batch and formulation-component models.
//!
//! A batch arrives with its tests already flattened into a linear list,
//! but it retains the original nested component → test-type tree. The
//! resolver uses that tree to re-associate a flattened test with the
//! formulation component (API) it was generated from.

use serde::{Deserialize, Serialize};

use super::Test;

/// A production batch with schedulable tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Unique batch identifier.
    pub id: String,
    /// Batch number as printed on documentation.
    #[serde(default)]
    pub batch_number: String,
    /// Product identifier.
    #[serde(default)]
    pub product_id: String,
    /// Product display name (denormalized onto scheduled tests).
    #[serde(default)]
    pub product_name: String,
    /// Formulation components with their nested test-type records.
    #[serde(default)]
    pub components: Vec<FormulationComponent>,
    /// Flattened test list.
    #[serde(default)]
    pub tests: Vec<Test>,
}

/// A formulation component (API) of a batch's product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulationComponent {
    /// Component (API) identifier.
    pub id: String,
    /// Component display name.
    #[serde(default)]
    pub name: String,
    /// Test-type records this component generates tests from.
    #[serde(default)]
    pub tests: Vec<ComponentTest>,
}

/// A test-type record nested under a formulation component.
///
/// Carries the structural fields the resolver matches flattened tests
/// against. Not schedulable itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentTest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub column_code: String,
    #[serde(default)]
    pub detector_id: String,
    #[serde(default)]
    pub mobile_phases: Vec<String>,
    #[serde(default)]
    pub runtime_minutes: f64,
    #[serde(default)]
    pub sample_injections: u32,
    #[serde(default)]
    pub standard_injections: u32,
    #[serde(default)]
    pub pharmacopoeia: Option<String>,
    /// Linked test-type flag; linked tests of one batch group together.
    #[serde(default)]
    pub linked: bool,
}

impl Batch {
    /// Creates an empty batch.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            batch_number: String::new(),
            product_id: String::new(),
            product_name: String::new(),
            components: Vec::new(),
            tests: Vec::new(),
        }
    }

    /// Sets the batch number.
    pub fn with_batch_number(mut self, number: impl Into<String>) -> Self {
        self.batch_number = number.into();
        self
    }

    /// Sets product id and name.
    pub fn with_product(
        mut self,
        product_id: impl Into<String>,
        product_name: impl Into<String>,
    ) -> Self {
        self.product_id = product_id.into();
        self.product_name = product_name.into();
        self
    }

    /// Adds a formulation component.
    pub fn with_component(mut self, component: FormulationComponent) -> Self {
        self.components.push(component);
        self
    }

    /// Adds a flattened test.
    pub fn with_test(mut self, test: Test) -> Self {
        self.tests.push(test);
        self
    }

    /// Tests eligible for scheduling (status not-started).
    pub fn schedulable_tests(&self) -> impl Iterator<Item = &Test> {
        self.tests.iter().filter(|t| t.is_schedulable())
    }
}

impl FormulationComponent {
    /// Creates an empty component.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tests: Vec::new(),
        }
    }

    /// Adds a test-type record.
    pub fn with_test(mut self, test: ComponentTest) -> Self {
        self.tests.push(test);
        self
    }
}

impl ComponentTest {
    /// Creates a named test-type record.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_code: String::new(),
            detector_id: String::new(),
            mobile_phases: Vec::new(),
            runtime_minutes: 0.0,
            sample_injections: 0,
            standard_injections: 0,
            pharmacopoeia: None,
            linked: false,
        }
    }

    /// Sets column code and detector id.
    pub fn with_method(
        mut self,
        column_code: impl Into<String>,
        detector_id: impl Into<String>,
    ) -> Self {
        self.column_code = column_code.into();
        self.detector_id = detector_id.into();
        self
    }

    /// Sets the mobile-phase codes.
    pub fn with_mobile_phases<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mobile_phases = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-injection runtime (minutes).
    pub fn with_runtime(mut self, minutes: f64) -> Self {
        self.runtime_minutes = minutes;
        self
    }

    /// Sets sample and standard injection counts.
    pub fn with_injections(mut self, sample: u32, standard: u32) -> Self {
        self.sample_injections = sample;
        self.standard_injections = standard;
        self
    }

    /// Sets the pharmacopoeia reference.
    pub fn with_pharmacopoeia(mut self, reference: impl Into<String>) -> Self {
        self.pharmacopoeia = Some(reference.into());
        self
    }

    /// Marks this test type as linked.
    pub fn with_linked(mut self, linked: bool) -> Self {
        self.linked = linked;
        self
    }
}
