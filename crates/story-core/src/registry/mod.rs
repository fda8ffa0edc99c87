//! Registro de pasos: la tabla del DAG y sus operaciones de grafo.
//!
//! El registro es inmutable después de construirse. La aciclicidad queda
//! garantizada por construcción: todo padre debe tener índice menor que su
//! hijo, por lo que el orden topológico es el orden natural de índices.

use std::collections::BTreeSet;

use crate::errors::EngineError;
use crate::step::StepDescriptor;

#[derive(Debug)]
pub struct StepRegistry {
    steps: Vec<StepDescriptor>,
}

impl StepRegistry {
    /// Valida índices consecutivos desde 0 y padres estrictamente menores.
    pub fn new(steps: Vec<StepDescriptor>) -> Result<Self, EngineError> {
        for (i, step) in steps.iter().enumerate() {
            if step.index != i {
                return Err(EngineError::Internal(format!("step table out of order at index {i}")));
            }
            if let Some(&bad) = step.parents.iter().find(|&&p| p >= i) {
                return Err(EngineError::Internal(format!("step {i} depends on non-upstream step {bad}")));
            }
        }
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn descriptor(&self, index: usize) -> Result<&StepDescriptor, EngineError> {
        self.steps.get(index).ok_or(EngineError::InvalidStepIndex(index))
    }

    pub fn parents(&self, index: usize) -> &[usize] {
        self.steps.get(index).map(|s| s.parents).unwrap_or(&[])
    }

    /// Orden de ejecución. Válido porque los padres preceden a sus hijos.
    pub fn topological_order(&self) -> Vec<usize> {
        (0..self.steps.len()).collect()
    }

    /// Clausura transitiva de hijos de `index` (para invalidación en cascada).
    pub fn downstream(&self, index: usize) -> BTreeSet<usize> {
        let mut reached = BTreeSet::new();
        for j in (index + 1)..self.steps.len() {
            if self.steps[j].parents.iter().any(|p| *p == index || reached.contains(p)) {
                reached.insert(j);
            }
        }
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StepContext;
    use crate::step::{ParsedPayload, StepDefinition, StepDescriptor, StepPlan};
    use crate::validate::ValidationReport;
    use std::sync::Arc;

    struct NoopStep;

    impl StepDefinition for NoopStep {
        fn prompt_version(&self) -> &str {
            "pv"
        }

        fn plan(&self, _ctx: &StepContext) -> Result<StepPlan, EngineError> {
            Err(EngineError::Internal("noop".into()))
        }

        fn parse(&self, raw: &str) -> ParsedPayload {
            ParsedPayload::degraded(serde_json::json!({ "content": raw }))
        }

        fn validate(&self, _payload: &serde_json::Value, _ctx: &StepContext) -> ValidationReport {
            ValidationReport::ok()
        }
    }

    fn row(index: usize, parents: &'static [usize]) -> StepDescriptor {
        StepDescriptor { index,
                         name: "noop",
                         parents,
                         tier: crate::llm::ModelTier::Fast,
                         max_tokens: 1,
                         temperature: 0.0,
                         fanout: false,
                         allow_fallback: false,
                         definition: Arc::new(NoopStep) }
    }

    #[test]
    fn forward_parents_are_rejected() {
        let err = StepRegistry::new(vec![row(0, &[]), row(1, &[2]), row(2, &[])]).unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
    }

    #[test]
    fn out_of_order_indices_are_rejected() {
        assert!(StepRegistry::new(vec![row(1, &[])]).is_err());
    }

    #[test]
    fn downstream_is_transitive() {
        // 0 → 1 → 3, 0 → 2
        let registry = StepRegistry::new(vec![row(0, &[]), row(1, &[0]), row(2, &[0]), row(3, &[1])]).unwrap();
        assert_eq!(registry.downstream(1).into_iter().collect::<Vec<_>>(), vec![3]);
        assert_eq!(registry.downstream(0).len(), 3);
        assert!(registry.downstream(3).is_empty());
    }

    #[test]
    fn topological_order_is_the_index_order() {
        let registry = StepRegistry::new(vec![row(0, &[]), row(1, &[0])]).unwrap();
        assert_eq!(registry.topological_order(), vec![0, 1]);
    }
}
