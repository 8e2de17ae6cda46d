//! The rewrite driver: a local double-pushout step at `graph_id`, followed
//! by reverse-BFS backward propagation through every ancestor so all
//! typings keep commuting.
//!
//! All mutation is staged in shadow maps and committed in a single pass at
//! the end: if any step errors, this function returns before touching
//! `self`, so the hierarchy is left exactly as it was on entry.

use std::collections::{BTreeMap, BTreeSet};

use daggy::petgraph::Direction;
use daggy::NodeIndex;

use crate::category::{nary_pullback, pullback, pullback_complement, pushout, Cospan};
use crate::error::Error;
use crate::graph::Graph;
use crate::hierarchy::{HEdge, HNode, Hierarchy};
use crate::hom::{keys_by_value, Mapping};
use crate::rule::Rule;
use crate::value::Value;

/// A graph ancestor's staged update: the pullback apex (`intermediate`) and
/// its mapping back to the ancestor's original graph, plus (only for the
/// graph the rewrite was applied to) the final pushed-out graph.
struct GraphUpdate {
    intermediate: Graph,
    to_original: Mapping,
    final_graph: Option<Graph>,
}

enum EdgeUpdate {
    Typing { mapping: Mapping, ignore_attrs: bool },
    RuleTyping { lhs_mapping: Mapping, rhs_mapping: Mapping, ignore_attrs: bool },
}

impl Hierarchy {
    /// Apply `rule` at `instance: L -> graph(graph_id)`, then propagate the
    /// change backward through every ancestor.
    pub fn rewrite(
        &mut self,
        graph_id: &Value,
        instance: &Mapping,
        rule: &Rule,
        lhs_typing: &BTreeMap<Value, (Mapping, bool)>,
        rhs_typing: &BTreeMap<Value, (Mapping, bool)>,
    ) -> Result<(), Error> {
        let idx = self.idx(graph_id)?;
        if self.rule_at(idx).is_ok() {
            return Err(Error::WrongNodeKind(format!("{graph_id} is a rule; rewriting a rule is not supported")));
        }
        log::info!(
            "rewriting {graph_id} with a rule removing {} node(s) and adding {} node(s)",
            rule.removed_nodes().len(),
            rule.rhs.nodes().count().saturating_sub(rule.p.nodes().count()),
        );
        for (typing_graph, (mapping, ignore_attrs)) in lhs_typing {
            crate::hom::check_hom(&rule.lhs, self.graph(typing_graph)?, mapping, *ignore_attrs)?;
        }
        for (typing_graph, (mapping, ignore_attrs)) in rhs_typing {
            crate::hom::check_hom(&rule.rhs, self.graph(typing_graph)?, mapping, *ignore_attrs)?;
        }

        // -- Step 1: local DPO rewrite ---------------------------------------
        let graph = self.graph_at(idx)?.clone();
        let (g_m, p_g_m, g_m_g) = pullback_complement(&rule.p, &rule.lhs, &graph, &rule.p_lhs, instance, false)?;
        let (g_prime, _g_m_g_prime, _r_g_prime) = pushout(&rule.p, &g_m, &rule.rhs, &p_g_m, &rule.p_rhs, false)?;

        let mut updated_graphs: BTreeMap<Value, GraphUpdate> = BTreeMap::new();
        updated_graphs.insert(
            graph_id.clone(),
            GraphUpdate { intermediate: g_m.clone(), to_original: g_m_g.clone(), final_graph: Some(g_prime) },
        );
        let mut updated_rules: BTreeMap<Value, Rule> = BTreeMap::new();
        let mut removed_edges: BTreeSet<(Value, Value)> = BTreeSet::new();
        let mut updated_edges: BTreeMap<(Value, Value), EdgeUpdate> = BTreeMap::new();

        for edge in self.dag.graph().edges_directed(idx, Direction::Outgoing) {
            let HEdge::Typing { mapping: original_mapping, .. } = edge.weight() else { continue };
            let typing_graph = self.node(edge.target()).id().clone();
            if !rhs_typing.contains_key(&typing_graph) {
                removed_edges.insert((graph_id.clone(), typing_graph));
                continue;
            }

            let mut new_hom = original_mapping.clone();
            let mut new_nodes: Mapping = Mapping::new();
            let mut removed_nodes: BTreeSet<Value> = BTreeSet::new();

            for node in rule.lhs.nodes() {
                let p_keys = keys_by_value(&rule.p_lhs, node);
                if p_keys.is_empty() {
                    removed_nodes.insert(node.clone());
                } else if p_keys.len() > 1 {
                    for k in &p_keys {
                        new_nodes.insert(p_g_m[k].clone(), lhs_typing[&typing_graph].0[node].clone());
                    }
                }
            }
            for node in rule.rhs.nodes() {
                let p_keys = keys_by_value(&rule.p_rhs, node);
                if p_keys.is_empty() {
                    new_nodes.insert(node.clone(), rhs_typing[&typing_graph].0[node].clone());
                } else if p_keys.len() > 1 {
                    for k in &p_keys {
                        removed_nodes.insert(instance[&rule.p_lhs[k]].clone());
                    }
                    new_nodes.insert(node.clone(), rhs_typing[&typing_graph].0[node].clone());
                }
            }

            for n in &removed_nodes {
                new_hom.remove(n);
            }
            new_hom.extend(new_nodes);
            let ignore_attrs = rhs_typing[&typing_graph].1;
            updated_edges.insert((graph_id.clone(), typing_graph), EdgeUpdate::Typing { mapping: new_hom, ignore_attrs });
        }

        // -- Step 2: backward propagation -------------------------------------
        let mut current_level: BTreeSet<Value> = self
            .dag
            .graph()
            .neighbors_directed(idx, Direction::Incoming)
            .map(|p| self.node(p).id().clone())
            .collect();
        let mut successors: BTreeMap<Value, Vec<Value>> =
            current_level.iter().map(|n| (n.clone(), vec![graph_id.clone()])).collect();

        while !current_level.is_empty() {
            let mut next_level: BTreeSet<Value> = BTreeSet::new();
            for graph_node in current_level.iter() {
                let node_idx = self.idx(graph_node)?;
                let sucs = successors[graph_node].clone();
                log::debug!("propagating into {graph_node} ({} successor(s) changed)", sucs.len());

                if sucs.len() == 1 {
                    let suc = &sucs[0];
                    if let Some(update) = updated_graphs.get(suc) {
                        // nothing to do unless this ancestor's graph/rule is
                        // actually typed into `suc`; always true here since
                        // `suc` only enters `successors` via a real edge.
                        if self.graph_at(node_idx).is_ok() {
                            self.propagate_graph_simple(graph_node, node_idx, suc, update, &mut updated_graphs, &mut updated_edges)?;
                        } else {
                            self.propagate_rule_simple(graph_node, node_idx, suc, update, &mut updated_rules, &mut updated_edges)?;
                        }
                    }
                } else {
                    let mut cospans: BTreeMap<Value, Cospan> = BTreeMap::new();
                    for suc in &sucs {
                        if let Some(update) = updated_graphs.get(suc) {
                            let edge = self.edge_between(node_idx, self.idx(suc)?);
                            if let HEdge::Typing { mapping, .. } = edge {
                                cospans.insert(
                                    suc.clone(),
                                    (update.intermediate.clone(), self.graph_at(self.idx(suc)?)?.clone(), mapping.clone(), update.to_original.clone()),
                                );
                            }
                        }
                    }
                    if self.graph_at(node_idx).is_ok() {
                        self.propagate_graph_cospan(graph_node, node_idx, &cospans, &mut updated_graphs, &mut updated_edges)?;
                    } else {
                        self.propagate_rule_cospan(graph_node, node_idx, &sucs, &updated_graphs, &mut updated_rules, &mut updated_edges)?;
                    }
                }

                for pred in self.dag.graph().neighbors_directed(node_idx, Direction::Incoming).collect::<Vec<_>>() {
                    let pred_id = self.node(pred).id().clone();
                    next_level.insert(pred_id.clone());
                    successors.entry(pred_id).or_default().push(graph_node.clone());
                }
            }
            current_level = next_level;
        }

        // -- Step 3: commit ----------------------------------------------------
        log::debug!(
            "committing rewrite: {} graph(s), {} rule(s), {} edge removal(s), {} edge update(s)",
            updated_graphs.len(),
            updated_rules.len(),
            removed_edges.len(),
            updated_edges.len(),
        );
        for (id, update) in updated_graphs {
            let idx = self.idx(&id)?;
            let new_graph = update.final_graph.unwrap_or(update.intermediate);
            if let HNode::Graph { graph, .. } = self.node_mut(idx) {
                *graph = new_graph;
            }
        }
        for (id, rule) in updated_rules {
            let idx = self.idx(&id)?;
            if let HNode::Rule { rule: slot, .. } = self.node_mut(idx) {
                *slot = rule;
            }
        }
        for (s, t) in removed_edges {
            let (s_idx, t_idx) = (self.idx(&s)?, self.idx(&t)?);
            if let Some(e) = self.dag.graph().edges_directed(s_idx, Direction::Outgoing).find(|e| e.target() == t_idx).map(|e| e.id()) {
                self.dag.remove_edge(e);
            }
        }
        for ((s, t), update) in updated_edges {
            let (s_idx, t_idx) = (self.idx(&s)?, self.idx(&t)?);
            let e_idx = self
                .dag
                .graph()
                .edges_directed(s_idx, Direction::Outgoing)
                .find(|e| e.target() == t_idx)
                .map(|e| e.id())
                .expect("edge to update must exist");
            let attrs = match self.dag.edge_weight(e_idx).unwrap() {
                HEdge::Typing { attrs, .. } => attrs.clone(),
                HEdge::RuleTyping { attrs, .. } => attrs.clone(),
            };
            let new_weight = match update {
                EdgeUpdate::Typing { mapping, ignore_attrs } => HEdge::Typing { mapping, ignore_attrs, attrs },
                EdgeUpdate::RuleTyping { lhs_mapping, rhs_mapping, ignore_attrs } => {
                    HEdge::RuleTyping { lhs_mapping, rhs_mapping, ignore_attrs, attrs }
                }
            };
            *self.dag.edge_weight_mut(e_idx).unwrap() = new_weight;
        }

        Ok(())
    }

    fn propagate_graph_simple(
        &self,
        graph_node: &Value,
        node_idx: NodeIndex<u32>,
        suc: &Value,
        update: &GraphUpdate,
        updated_graphs: &mut BTreeMap<Value, GraphUpdate>,
        updated_edges: &mut BTreeMap<(Value, Value), EdgeUpdate>,
    ) -> Result<(), Error> {
        let suc_idx = self.idx(suc)?;
        let edge = self.edge_between(node_idx, suc_idx);
        let HEdge::Typing { mapping, ignore_attrs, .. } = edge else {
            return Ok(());
        };
        let ignore_attrs = *ignore_attrs;
        let original_graph = self.graph_at(node_idx)?;
        let suc_graph = self.graph_at(suc_idx)?;
        let (apex, apex_to_graph, apex_to_suc) =
            pullback(original_graph, &update.intermediate, suc_graph, mapping, &update.to_original, false)?;
        updated_edges.insert((graph_node.clone(), suc.clone()), EdgeUpdate::Typing { mapping: apex_to_suc, ignore_attrs });
        updated_graphs.insert(graph_node.clone(), GraphUpdate { intermediate: apex, to_original: apex_to_graph, final_graph: None });
        Ok(())
    }

    fn propagate_rule_simple(
        &self,
        graph_node: &Value,
        node_idx: NodeIndex<u32>,
        suc: &Value,
        update: &GraphUpdate,
        updated_rules: &mut BTreeMap<Value, Rule>,
        updated_edges: &mut BTreeMap<(Value, Value), EdgeUpdate>,
    ) -> Result<(), Error> {
        let suc_idx = self.idx(suc)?;
        let edge = self.edge_between(node_idx, suc_idx);
        let HEdge::RuleTyping { lhs_mapping, rhs_mapping, ignore_attrs, .. } = edge else {
            return Ok(());
        };
        let ignore_attrs = *ignore_attrs;
        let rule = self.rule_at(node_idx)?;
        let suc_graph = self.graph_at(suc_idx)?;

        let (lhs_m, lhs_m_lhs, lhs_m_suc_m) =
            pullback(&rule.lhs, &update.intermediate, suc_graph, lhs_mapping, &update.to_original, false)?;

        let p_mapping: Mapping = rule
            .p
            .nodes()
            .map(|n| (n.clone(), lhs_mapping[&rule.p_lhs[n]].clone()))
            .collect();
        let (p_m, p_m_p, _) = pullback(&rule.p, &update.intermediate, suc_graph, &p_mapping, &update.to_original, false)?;

        let (rhs_m, rhs_m_rhs, rhs_m_suc_m) =
            pullback(&rule.rhs, &update.intermediate, suc_graph, rhs_mapping, &update.to_original, false)?;

        let (new_p_lhs, new_p_rhs) = reconstruct_span(rule, &p_m_p, &lhs_m_lhs, &rhs_m_rhs)?;

        updated_rules.insert(
            graph_node.clone(),
            Rule { lhs: lhs_m, p: p_m, rhs: rhs_m, p_lhs: new_p_lhs, p_rhs: new_p_rhs },
        );
        updated_edges.insert(
            (graph_node.clone(), suc.clone()),
            EdgeUpdate::RuleTyping { lhs_mapping: lhs_m_suc_m, rhs_mapping: rhs_m_suc_m, ignore_attrs },
        );
        Ok(())
    }

    fn propagate_graph_cospan(
        &self,
        graph_node: &Value,
        node_idx: NodeIndex<u32>,
        cospans: &BTreeMap<Value, Cospan>,
        updated_graphs: &mut BTreeMap<Value, GraphUpdate>,
        updated_edges: &mut BTreeMap<(Value, Value), EdgeUpdate>,
    ) -> Result<(), Error> {
        let original_graph = self.graph_at(node_idx)?;
        let (apex, apex_to_graph, apex_to_sucs) = nary_pullback(original_graph, cospans, false)?;
        for (suc, mapping) in apex_to_sucs {
            let ignore_attrs = match self.edge_between(node_idx, self.idx(&suc)?) {
                HEdge::Typing { ignore_attrs, .. } => *ignore_attrs,
                HEdge::RuleTyping { .. } => false,
            };
            updated_edges.insert((graph_node.clone(), suc), EdgeUpdate::Typing { mapping, ignore_attrs });
        }
        updated_graphs.insert(graph_node.clone(), GraphUpdate { intermediate: apex, to_original: apex_to_graph, final_graph: None });
        Ok(())
    }

    fn propagate_rule_cospan(
        &self,
        graph_node: &Value,
        node_idx: NodeIndex<u32>,
        sucs: &[Value],
        updated_graphs: &BTreeMap<Value, GraphUpdate>,
        updated_rules: &mut BTreeMap<Value, Rule>,
        updated_edges: &mut BTreeMap<(Value, Value), EdgeUpdate>,
    ) -> Result<(), Error> {
        let rule = self.rule_at(node_idx)?;

        let mut lhs_cospans: BTreeMap<Value, Cospan> = BTreeMap::new();
        let mut p_cospans: BTreeMap<Value, Cospan> = BTreeMap::new();
        let mut rhs_cospans: BTreeMap<Value, Cospan> = BTreeMap::new();
        let mut ignore_attrs_by_suc: BTreeMap<Value, bool> = BTreeMap::new();

        for suc in sucs {
            let Some(update) = updated_graphs.get(suc) else { continue };
            let suc_idx = self.idx(suc)?;
            let suc_graph = self.graph_at(suc_idx)?.clone();
            let HEdge::RuleTyping { lhs_mapping, rhs_mapping, ignore_attrs, .. } = self.edge_between(node_idx, suc_idx) else {
                continue;
            };
            ignore_attrs_by_suc.insert(suc.clone(), *ignore_attrs);
            lhs_cospans.insert(suc.clone(), (update.intermediate.clone(), suc_graph.clone(), lhs_mapping.clone(), update.to_original.clone()));
            let p_mapping: Mapping = rule.p.nodes().map(|n| (n.clone(), lhs_mapping[&rule.p_lhs[n]].clone())).collect();
            p_cospans.insert(suc.clone(), (update.intermediate.clone(), suc_graph.clone(), p_mapping, update.to_original.clone()));
            rhs_cospans.insert(suc.clone(), (update.intermediate.clone(), suc_graph, rhs_mapping.clone(), update.to_original.clone()));
        }

        let (lhs_m, lhs_m_lhs, lhs_m_sucs) = nary_pullback(&rule.lhs, &lhs_cospans, false)?;
        let (p_m, p_m_p, _) = nary_pullback(&rule.p, &p_cospans, false)?;
        let (rhs_m, rhs_m_rhs, rhs_m_sucs) = nary_pullback(&rule.rhs, &rhs_cospans, false)?;

        let (new_p_lhs, new_p_rhs) = reconstruct_span(rule, &p_m_p, &lhs_m_lhs, &rhs_m_rhs)?;

        updated_rules.insert(
            graph_node.clone(),
            Rule { lhs: lhs_m, p: p_m, rhs: rhs_m, p_lhs: new_p_lhs, p_rhs: new_p_rhs },
        );
        for suc in sucs {
            if let (Some(l), Some(r)) = (lhs_m_sucs.get(suc), rhs_m_sucs.get(suc)) {
                updated_edges.insert(
                    (graph_node.clone(), suc.clone()),
                    EdgeUpdate::RuleTyping {
                        lhs_mapping: l.clone(),
                        rhs_mapping: r.clone(),
                        ignore_attrs: ignore_attrs_by_suc.get(suc).copied().unwrap_or(false),
                    },
                );
            }
        }
        Ok(())
    }
}

/// Rebuild `pL⁻ = P⁻ -> L⁻` and `pR⁻ = P⁻ -> R⁻` from the pullback preimage
/// structure, checking that clone counts agree.
fn reconstruct_span(rule: &Rule, p_m_p: &Mapping, lhs_m_lhs: &Mapping, rhs_m_rhs: &Mapping) -> Result<(Mapping, Mapping), Error> {
    let mut new_p_lhs = Mapping::new();
    let mut new_p_rhs = Mapping::new();

    for node in rule.p.nodes() {
        let p_m_keys = keys_by_value(p_m_p, node);
        if p_m_keys.is_empty() {
            continue;
        }
        let lhs_node = &rule.p_lhs[node];
        let lhs_m_keys = keys_by_value(lhs_m_lhs, lhs_node);
        if lhs_m_keys.len() != p_m_keys.len() {
            return Err(Error::PropagationInconsistent(format!(
                "clone count of P-node {node} ({}) disagrees with L-node {lhs_node} ({})",
                p_m_keys.len(),
                lhs_m_keys.len()
            )));
        }
        for (p_m_key, lhs_m_key) in p_m_keys.iter().zip(lhs_m_keys.iter()) {
            new_p_lhs.insert(p_m_key.clone(), lhs_m_key.clone());
        }

        let rhs_node = &rule.p_rhs[node];
        let rhs_m_keys = keys_by_value(rhs_m_rhs, rhs_node);
        if rhs_m_keys.len() != p_m_keys.len() {
            return Err(Error::PropagationInconsistent(format!(
                "clone count of P-node {node} ({}) disagrees with R-node {rhs_node} ({})",
                p_m_keys.len(),
                rhs_m_keys.len()
            )));
        }
        for (p_m_key, rhs_m_key) in p_m_keys.iter().zip(rhs_m_keys.iter()) {
            new_p_rhs.insert(p_m_key.clone(), rhs_m_key.clone());
        }
    }

    Ok((new_p_lhs, new_p_rhs))
}
