//! Parameter expansion.
//!
//! Each parameterized declaration `T(&p[cap])` replaces template node `T`
//! with one node per option of `&p`. Every expanded node inherits all of
//! T's predecessors and successors, has `{{&p}}` substituted in its command,
//! carries the option value in `FROF_JOB_PARAM`, and joins the parallelism
//! group `T(&p)` with the declared cap.

use super::error::{FrofError, FrofResult};
use super::graph::{Graph, JobNode};
use super::job::Job;
use super::parser::ParsedSource;
use super::types::{ParameterizedDeclaration, ENV_JOB_PARAM};
use tracing::debug;

/// Substitute `{{&param}}` in a command with `value`.
pub fn interpolate(command: &str, param: &str, value: &str) -> String {
    let placeholder = format!("{{{{&{}}}}}", param);
    command.replace(&placeholder, value)
}

/// Parallelism group id for a template bound to a parameter.
pub fn group_id(job_id: &str, param: &str) -> String {
    format!("{}(&{})", job_id, param)
}

/// Id of the node produced for one option.
pub fn expanded_id(job_id: &str, option: &str) -> String {
    format!("{}_{}", job_id, option)
}

/// Expand every declaration in order and return the final graph.
pub fn expand(parsed: ParsedSource) -> FrofResult<Graph> {
    let ParsedSource {
        mut graph,
        parameters,
        declarations,
        ..
    } = parsed;

    for decl in &declarations {
        let options = parameters
            .get(&decl.param)
            .ok_or_else(|| FrofError::UndefinedParameter {
                param: decl.param.clone(),
                job_id: decl.job_id.clone(),
                at: decl.at,
            })?;
        expand_declaration(&mut graph, decl, options)?;
    }

    Ok(graph)
}

/// Replace the template node named by `decl` with one node per option.
pub fn expand_declaration(
    graph: &mut Graph,
    decl: &ParameterizedDeclaration,
    options: &[String],
) -> FrofResult<()> {
    let template = graph
        .node(&decl.job_id)
        .cloned()
        .ok_or_else(|| FrofError::UnknownNode(decl.job_id.clone()))?;
    let ins: Vec<String> = graph.predecessors(&decl.job_id).map(String::from).collect();
    let outs: Vec<String> = graph.successors(&decl.job_id).map(String::from).collect();
    // a self-edge would be rewired onto the template and vanish with it
    if outs.contains(&decl.job_id) {
        return Err(FrofError::Cycle {
            members: vec![decl.job_id.clone()],
        });
    }
    let group = group_id(&decl.job_id, &decl.param);

    for option in options {
        let id = expanded_id(&decl.job_id, option);
        if id == decl.job_id || graph.contains(&id) {
            return Err(FrofError::DuplicateJob {
                id,
                at: Some(decl.at),
            });
        }
        let job = match &template.job {
            Job::Shell { command, extra_env } => Job::Shell {
                command: interpolate(command, &decl.param, option),
                extra_env: extra_env.clone(),
            }
            .with_env(ENV_JOB_PARAM, option.clone()),
            noop @ Job::NoOp { .. } => noop.clone(),
        };
        graph.add_node(JobNode::new(id.clone(), job).in_group(group.clone(), decl.cap))?;
        for p in &ins {
            graph.add_edge(p, &id)?;
        }
        for s in &outs {
            graph.add_edge(&id, s)?;
        }
    }

    graph.remove_node(&decl.job_id);
    debug!(
        job = %decl.job_id,
        param = %decl.param,
        options = options.len(),
        group = %group,
        "expanded parameterized job"
    );
    Ok(())
}
