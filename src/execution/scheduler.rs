//! Step ordering - structural validation and dependency order

use crate::core::{Pipeline, PipelineError};
use std::collections::{HashMap, HashSet};

/// Validate pipeline structure: name, step names, dependency references, cycles
pub fn validate_structure(pipeline: &Pipeline) -> Result<(), PipelineError> {
    if pipeline.name.trim().is_empty() {
        return Err(PipelineError::EmptyName);
    }
    if pipeline.steps.is_empty() {
        return Err(PipelineError::NoSteps(pipeline.name.clone()));
    }

    let mut names = HashSet::new();
    for step in &pipeline.steps {
        if !names.insert(step.name.as_str()) {
            return Err(PipelineError::DuplicateStep(step.name.clone()));
        }
    }

    for step in &pipeline.steps {
        for dep in &step.dependencies {
            if !names.contains(dep.as_str()) {
                return Err(PipelineError::UnknownDependency {
                    step: step.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    execution_order(pipeline).map(|_| ())
}

/// Indices of the pipeline's steps in the order they should run
///
/// Every step comes after its dependencies. Otherwise the declared order is
/// kept, so a pipeline without dependencies runs exactly as listed.
pub fn execution_order(pipeline: &Pipeline) -> Result<Vec<usize>, PipelineError> {
    let index: HashMap<&str, usize> = pipeline
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    let mut order = Vec::with_capacity(pipeline.steps.len());
    let mut visited = vec![false; pipeline.steps.len()];
    let mut in_progress = vec![false; pipeline.steps.len()];

    for i in 0..pipeline.steps.len() {
        visit(i, pipeline, &index, &mut visited, &mut in_progress, &mut order)?;
    }

    Ok(order)
}

fn visit(
    i: usize,
    pipeline: &Pipeline,
    index: &HashMap<&str, usize>,
    visited: &mut [bool],
    in_progress: &mut [bool],
    order: &mut Vec<usize>,
) -> Result<(), PipelineError> {
    if visited[i] {
        return Ok(());
    }
    if in_progress[i] {
        return Err(PipelineError::DependencyCycle(pipeline.steps[i].name.clone()));
    }

    in_progress[i] = true;
    for dep in &pipeline.steps[i].dependencies {
        let Some(&d) = index.get(dep.as_str()) else {
            return Err(PipelineError::UnknownDependency {
                step: pipeline.steps[i].name.clone(),
                dependency: dep.clone(),
            });
        };
        visit(d, pipeline, index, visited, in_progress, order)?;
    }
    in_progress[i] = false;

    visited[i] = true;
    order.push(i);
    Ok(())
}
