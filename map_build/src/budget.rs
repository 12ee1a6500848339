//! Per-tag size budgets.
//!
//! A tag's budget is the size of its own structs plus, for every
//! size-adjusting edge leaving them, the full budget of the edge's target.
//! Edges are counted individually: two adjusting fields naming the same tag
//! add its budget twice.

use tag_format::align_up;

use crate::diagnostics::{Diagnostic, Severity};
use crate::error::DiscoveryError;
use crate::workload::{BuildWorkload, TagIndex};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

pub fn resolve_budgets(workload: &mut BuildWorkload) -> Result<(), DiscoveryError> {
    let count = workload.tags.len();
    let mut own = vec![0u64; count];
    for (_, compiled) in workload.structs.iter() {
        if let Some(origin) = compiled.origin {
            own[origin.0] += align_up(compiled.data.len(), compiled.alignment) as u64;
        }
    }

    let mut adjusting: Vec<Vec<TagIndex>> = vec![Vec::new(); count];
    for edge in workload.edges.iter().filter(|edge| edge.adjust_size) {
        let origin = workload
            .structs
            .get(edge.source)
            .and_then(|compiled| compiled.origin);
        if let Some(origin) = origin {
            adjusting[origin.0].push(edge.target);
        }
    }

    let mut budgets = vec![0u64; count];
    let mut marks = vec![Mark::Unvisited; count];
    for start in 0..count {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        // (tag, next edge to follow)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::Active;
        while let Some(top) = stack.last_mut() {
            let tag = top.0;
            if let Some(target) = adjusting[tag].get(top.1).copied() {
                top.1 += 1;
                match marks[target.0] {
                    Mark::Active => {
                        let position = stack
                            .iter()
                            .position(|(entry, _)| *entry == target.0)
                            .unwrap_or(0);
                        let mut cycle: Vec<String> = stack[position..]
                            .iter()
                            .map(|(entry, _)| workload.tag_name(TagIndex(*entry)))
                            .collect();
                        cycle.push(workload.tag_name(target));
                        return Err(DiscoveryError::CyclicDependencyDetected {
                            cycle: cycle.join(" -> "),
                        });
                    }
                    Mark::Unvisited => {
                        marks[target.0] = Mark::Active;
                        stack.push((target.0, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                let total = adjusting[tag]
                    .iter()
                    .fold(own[tag], |total, target| total.saturating_add(budgets[target.0]));
                budgets[tag] = total;
                marks[tag] = Mark::Done;
                stack.pop();
            }
        }
    }

    for (index, budget) in budgets.iter().enumerate() {
        let class = workload.tags[index].reference.class;
        if let Some(&ceiling) = workload.options.budget_ceilings.get(&class) {
            if *budget > ceiling {
                let tag = workload.tag_name(TagIndex(index));
                workload.diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    tag,
                    "",
                    format!(
                        "size budget of {} bytes exceeds the {} ceiling of {} bytes",
                        budget, class, ceiling
                    ),
                ));
            }
        }
        tracing::debug!(tag = %workload.tag_name(TagIndex(index)), budget, "resolved budget");
    }
    workload.budgets = budgets;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::{CompiledStruct, StructIndex};
    use crate::workload::{BuildOptions, DependencyEdge};
    use crate::fixtures::reference;
    use tag_format::definitions::{DAMAGE_EFFECT, SOUND};
    use tag_format::{Dialect, Record, TagClass};

    fn workload() -> BuildWorkload {
        let effect = reference(TagClass::DamageEffect, "effects\\hit");
        let mut workload = BuildWorkload::new(BuildOptions::new(Dialect::Retail, effect.clone()));
        workload.push_tag(effect, Record::new(&DAMAGE_EFFECT));
        workload.push_tag(reference(TagClass::Sound, "sound\\hit"), Record::new(&SOUND));
        workload
            .structs
            .push(CompiledStruct::blob(vec![0; 100], TagIndex(0)));
        workload
            .structs
            .push(CompiledStruct::blob(vec![0; 38], TagIndex(1)));
        workload
    }

    fn edge(source: usize, target: usize) -> DependencyEdge {
        DependencyEdge {
            source: StructIndex(source),
            offset: 0,
            target: TagIndex(target),
            adjust_size: true,
        }
    }

    #[test]
    fn adjusting_edges_count_once_each() {
        let mut workload = workload();
        workload.edges.push(edge(0, 1));
        workload.edges.push(edge(0, 1));
        resolve_budgets(&mut workload).expect("budgets");
        assert_eq!(workload.budgets, vec![100 + 40 + 40, 40]);
    }

    #[test]
    fn plain_edges_do_not_adjust() {
        let mut workload = workload();
        workload.edges.push(DependencyEdge {
            adjust_size: false,
            ..edge(0, 1)
        });
        resolve_budgets(&mut workload).expect("budgets");
        assert_eq!(workload.budgets, vec![100, 40]);
    }

    #[test]
    fn adjusting_loops_are_rejected() {
        let mut workload = workload();
        workload.edges.push(edge(0, 1));
        workload.edges.push(edge(1, 0));
        let err = resolve_budgets(&mut workload).expect_err("cycle");
        match err {
            DiscoveryError::CyclicDependencyDetected { cycle } => assert_eq!(
                cycle,
                "effects\\hit.damage_effect -> sound\\hit.sound -> effects\\hit.damage_effect"
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ceilings_turn_into_errors() {
        let mut workload = workload();
        workload.edges.push(edge(0, 1));
        workload
            .options
            .budget_ceilings
            .insert(TagClass::DamageEffect, 120);
        resolve_budgets(&mut workload).expect("budgets");
        assert_eq!(workload.diagnostics.errors(), 1);
    }
}
