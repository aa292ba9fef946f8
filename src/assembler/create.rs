//! Create flow: an attribute tree becomes a product graph
//!
//! Contained products and sub-packages are compiled first, each into an
//! inner graph with one subject. Product levels then resolve layer by layer
//! (a level waits for its parents); package levels resolve concurrently once
//! every inner graph is in.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use product_graph_algorithms::{dependency_depths, GraphView, NodeId};
use tokio::task::JoinSet;
use tracing::{debug, info};

use super::join_all_or_abort;
use super::relationships::{
    clinical_drug_relationships, is_clinical_drug, medicinal_product_relationships, package_options,
    package_relationships, product_options,
};
use crate::details::{MedicationProductDetails, PackageDetails};
use crate::error::{CompilerError, CompilerResult};
use crate::graph::{EdgeLabel, Identifier, Node, ProductGraph, Relationship};
use crate::model::{ModelLevel, ModelLevelType};
use crate::resolver::{ConceptResolver, NodeRequest};

type GraphFuture = Pin<Box<dyn Future<Output = CompilerResult<ProductGraph>> + Send>>;

/// Inner graph of one contained item
enum Inner {
    Product(ProductGraph),
    Package(ProductGraph),
}

#[derive(Clone)]
pub(crate) struct CreateFlow {
    resolver: ConceptResolver,
}

impl CreateFlow {
    pub(crate) fn new(resolver: ConceptResolver) -> Self {
        Self { resolver }
    }

    /// Boxed so sub-packages can recurse through spawned tasks
    pub(crate) fn package_graph(self, details: Arc<PackageDetails>) -> GraphFuture {
        Box::pin(async move { self.build_package(details).await })
    }

    pub(crate) async fn product_graph(
        &self,
        product: Arc<MedicationProductDetails>,
        selected: Arc<Vec<String>>,
    ) -> CompilerResult<ProductGraph> {
        let ctx = self.resolver.context();
        ctx.check_cancelled()?;
        let model = ctx.model.clone();
        let levels: Vec<ModelLevel> = model.product_levels().into_iter().cloned().collect();
        let layers = product_layers(&levels, |t| {
            model.parent_levels(t).into_iter().map(|l| l.model_level_type).collect()
        })?;

        let name_node = self.product_name_node(product.product_name.as_ref().map(|n| n.concept_id.as_str()));
        let levels_future = async {
            let mut resolved: HashMap<ModelLevelType, Node> = HashMap::new();
            for layer in &layers {
                let mut tasks = JoinSet::new();
                for &index in layer {
                    let level = levels[index].clone();
                    let parents: Vec<(ModelLevelType, Identifier)> = model
                        .parent_levels(level.model_level_type)
                        .into_iter()
                        .filter_map(|p| {
                            resolved
                                .get(&p.model_level_type)
                                .map(|n| (p.model_level_type, n.concept_id.clone()))
                        })
                        .collect();
                    let request = self.product_request(&product, &level, &parents, &selected);
                    let resolver = self.resolver.clone();
                    tasks.spawn(async move { resolver.resolve(request).await.map(|node| (index, node)) });
                }
                for node in join_all_or_abort(tasks).await? {
                    resolved.insert(node.model_level, node);
                }
            }
            Ok::<_, CompilerError>(resolved)
        };
        let (resolved, name_node) = tokio::try_join!(levels_future, name_node)?;

        let mut graph = ProductGraph::new();
        for level in &levels {
            if let Some(node) = resolved.get(&level.model_level_type) {
                graph.add_node(node.clone())?;
            }
        }
        for node in resolved.values() {
            for parent in model.parent_levels(node.model_level) {
                if let Some(parent_node) = resolved.get(&parent.model_level_type) {
                    graph.add_edge(&node.concept_id, &parent_node.concept_id, EdgeLabel::IsA);
                }
            }
        }
        if let Some(name) = name_node {
            let name_id = name.concept_id.clone();
            graph.add_node(name)?;
            for node in resolved.values().filter(|n| n.model_level.is_branded()) {
                graph.add_edge(&node.concept_id, &name_id, EdgeLabel::HasProductName);
            }
        }

        let leaf = model.leaf_product_level()?;
        let subject = resolved.get(&leaf.model_level_type).ok_or_else(|| {
            CompilerError::Validation(format!("no {} node was resolved", leaf.display_label))
        })?;
        graph.set_single_subject(&subject.concept_id)?;
        debug!(
            "Compiled product {} with {} nodes",
            subject.concept_id,
            graph.node_count()
        );
        Ok(graph)
    }

    fn product_request(
        &self,
        product: &MedicationProductDetails,
        level: &ModelLevel,
        parents: &[(ModelLevelType, Identifier)],
        selected: &[String],
    ) -> NodeRequest {
        let ctx = self.resolver.context();
        let model = &ctx.model;
        let (queried, stated): (Vec<_>, Vec<_>) = parents
            .iter()
            .partition(|(t, _)| is_clinical_drug(level.model_level_type) && is_clinical_drug(*t));
        let queried: Vec<Identifier> = queried.into_iter().map(|(_, id)| id.clone()).collect();
        let stated: Vec<Identifier> = stated.into_iter().map(|(_, id)| id.clone()).collect();

        let relationships = if is_clinical_drug(level.model_level_type) {
            clinical_drug_relationships(product, level, &queried, model)
        } else {
            medicinal_product_relationships(product, level)
        };
        let enforce = is_clinical_drug(level.model_level_type) && model.enforce_refsets();
        let mut request = NodeRequest::new(level, relationships)
            .with_refsets(vec![level.reference_set_id.clone()])
            .with_options(product_options(level))
            .enforce_refsets(enforce)
            .with_selected(selected.to_vec())
            .with_stated_parents(stated);
        if product.has_device_type() {
            request = request.with_semantic_tag(level.device_semantic_tag.clone());
        }
        if model
            .leaf_product_level()
            .map_or(false, |leaf| leaf.model_level_type == level.model_level_type)
        {
            request = request.with_non_defining_properties(product.non_defining_properties.clone());
        }
        request
    }

    /// Existing product name concept, when the model has a product name level
    async fn product_name_node(&self, product_name: Option<&str>) -> CompilerResult<Option<Node>> {
        let ctx = self.resolver.context();
        let (Some(name), Some(level)) = (product_name, ctx.model.level_of_type(ModelLevelType::ProductName)) else {
            return Ok(None);
        };
        self.resolver.fetch_node(name, level).await.map(Some)
    }

    async fn build_package(self, details: Arc<PackageDetails>) -> CompilerResult<ProductGraph> {
        let ctx = self.resolver.context().clone();
        ctx.check_cancelled()?;
        let model = ctx.model.clone();
        let selected = Arc::new(details.selected_concept_identifiers.clone());

        // Inner graphs first; contained products are numbered before sub-packages
        let mut tasks = JoinSet::new();
        for (index, contained) in details.contained_products.iter().enumerate() {
            let flow = self.clone();
            let product = Arc::new(contained.product_details.clone());
            let selected = selected.clone();
            tasks.spawn(async move {
                flow.product_graph(product, selected)
                    .await
                    .map(|g| (index, Inner::Product(g)))
            });
        }
        let offset = details.contained_products.len();
        for (index, contained) in details.contained_packages.iter().enumerate() {
            let inner = self.clone().package_graph(Arc::new(contained.package_details.clone()));
            tasks.spawn(async move { inner.await.map(|g| (offset + index, Inner::Package(g))) });
        }
        let mut product_graphs = Vec::new();
        let mut package_graphs = Vec::new();
        for inner in join_all_or_abort(tasks).await? {
            match inner {
                Inner::Product(g) => product_graphs.push(g),
                Inner::Package(g) => package_graphs.push(g),
            }
        }

        let levels: Vec<ModelLevel> = model.package_levels().into_iter().cloned().collect();
        let leaf = model.leaf_package_level()?.model_level_type;
        let mut tasks = JoinSet::new();
        for (index, level) in levels.iter().enumerate() {
            let request = self.package_request(&details, level, leaf, &product_graphs, &package_graphs)?;
            let resolver = self.resolver.clone();
            tasks.spawn(async move { resolver.resolve(request).await.map(|node| (index, node)) });
        }
        let name_node = self.product_name_node(details.product_name.as_ref().map(|n| n.concept_id.as_str()));
        let (nodes, name_node) = tokio::try_join!(join_all_or_abort(tasks), name_node)?;
        let mut resolved: HashMap<ModelLevelType, Node> =
            nodes.into_iter().map(|n| (n.model_level, n)).collect();

        // Parent linkage waits until both ends are resolved
        let parent_ids: HashMap<ModelLevelType, Identifier> =
            resolved.iter().map(|(t, n)| (*t, n.concept_id.clone())).collect();
        for node in resolved.values_mut() {
            let parents: Vec<Identifier> = model
                .parent_levels(node.model_level)
                .into_iter()
                .filter_map(|p| parent_ids.get(&p.model_level_type).cloned())
                .collect();
            if let Some(proposal) = node.new_concept_details.as_mut() {
                for parent in &parents {
                    proposal.axiom.relationships.insert(Relationship::is_a(parent.clone()));
                }
            }
        }

        let mut graph = ProductGraph::new();
        for level in &levels {
            if let Some(node) = resolved.get(&level.model_level_type) {
                graph.add_node(node.clone())?;
            }
        }
        for node in resolved.values() {
            for parent in model.parent_levels(node.model_level) {
                if let Some(parent_id) = parent_ids.get(&parent.model_level_type) {
                    graph.add_edge(&node.concept_id, parent_id, EdgeLabel::IsA);
                }
            }
        }
        let subject = parent_ids
            .get(&leaf)
            .ok_or_else(|| CompilerError::Validation(format!("no {} node was resolved", leaf)))?;
        graph.set_single_subject(subject)?;

        if let Some(name) = name_node {
            let name_id = name.concept_id.clone();
            graph.add_node(name)?;
            for node in resolved.values().filter(|n| n.model_level.is_branded()) {
                graph.add_edge(&node.concept_id, &name_id, EdgeLabel::HasProductName);
            }
        }

        for level in &levels {
            let Some(source) = parent_ids.get(&level.model_level_type) else {
                continue;
            };
            for inner in &package_graphs {
                let target = inner.single_concept_with_label(&level.display_label)?.concept_id.clone();
                graph.add_edge(source, &target, EdgeLabel::Contains);
            }
            let product_label = contained_product_label(&model, level)?;
            for inner in &product_graphs {
                let target = inner.single_concept_with_label(&product_label)?.concept_id.clone();
                graph.add_edge(source, &target, EdgeLabel::Contains);
            }
        }
        for inner in product_graphs.into_iter().chain(package_graphs) {
            graph.merge(inner)?;
        }

        info!(
            "Compiled package {} with {} nodes and {} edges",
            subject,
            graph.node_count(),
            graph.edges().len()
        );
        Ok(graph)
    }

    fn package_request(
        &self,
        details: &PackageDetails,
        level: &ModelLevel,
        leaf: ModelLevelType,
        product_graphs: &[ProductGraph],
        package_graphs: &[ProductGraph],
    ) -> CompilerResult<NodeRequest> {
        let model = &self.resolver.context().model;
        let product_label = contained_product_label(model, level)?;
        let products = details
            .contained_products
            .iter()
            .zip(product_graphs)
            .map(|(quantity, inner)| {
                inner
                    .single_concept_with_label(&product_label)
                    .map(|n| (quantity, n.concept_id.clone()))
            })
            .collect::<CompilerResult<Vec<_>>>()?;
        let packages = details
            .contained_packages
            .iter()
            .zip(package_graphs)
            .map(|(quantity, inner)| {
                inner
                    .single_concept_with_label(&level.display_label)
                    .map(|n| (quantity, n.concept_id.clone()))
            })
            .collect::<CompilerResult<Vec<_>>>()?;

        let relationships = package_relationships(details, level, &products, &packages, model);
        let mut request = NodeRequest::new(level, relationships)
            .with_refsets(vec![level.reference_set_id.clone()])
            .with_options(package_options(level))
            .enforce_refsets(model.enforce_refsets())
            .with_selected(details.selected_concept_identifiers.clone());
        if details.has_device_type() {
            request = request.with_semantic_tag(level.device_semantic_tag.clone());
        }
        if level.model_level_type == leaf {
            request = request
                .with_refset_members(details.refset_members.clone())
                .with_non_defining_properties(details.non_defining_properties.clone());
        }
        Ok(request)
    }
}

/// Display label of the product level a package level contains
fn contained_product_label(model: &crate::model::ModelConfiguration, level: &ModelLevel) -> CompilerResult<String> {
    level
        .model_level_type
        .contained_product_level()
        .and_then(|t| model.level_of_type(t))
        .map(|l| l.display_label.clone())
        .ok_or_else(|| {
            CompilerError::InvalidConfiguration(format!(
                "package level {} has no contained product level in the {:?} model",
                level.display_label, model.model_type
            ))
        })
}

/// Group level indices so every level comes after the levels it depends on
fn product_layers<F>(levels: &[ModelLevel], parents_of: F) -> CompilerResult<Vec<Vec<usize>>>
where
    F: Fn(ModelLevelType) -> Vec<ModelLevelType>,
{
    let nodes: Vec<NodeId> = (0..levels.len() as NodeId).collect();
    let mut edges = Vec::new();
    for (index, level) in levels.iter().enumerate() {
        for parent in parents_of(level.model_level_type) {
            if let Some(p) = levels.iter().position(|l| l.model_level_type == parent) {
                edges.push((index as NodeId, p as NodeId));
            }
        }
    }
    let view = GraphView::from_edges(&nodes, &edges);
    let depths = dependency_depths(&view)?;
    let mut layers: Vec<Vec<usize>> = Vec::new();
    for (position, depth) in depths.into_iter().enumerate() {
        let index = view.index_to_node[position] as usize;
        if layers.len() <= depth {
            layers.resize(depth + 1, Vec::new());
        }
        layers[depth].push(index);
    }
    for layer in &mut layers {
        layer.sort_unstable();
    }
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfiguration;

    #[test]
    fn test_amt_product_layers() {
        let model = ModelConfiguration::amt();
        let levels: Vec<ModelLevel> = model.product_levels().into_iter().cloned().collect();
        let layers = product_layers(&levels, |t| {
            model.parent_levels(t).into_iter().map(|l| l.model_level_type).collect()
        })
        .unwrap();
        let labels: Vec<Vec<&str>> = layers
            .iter()
            .map(|layer| layer.iter().map(|&i| levels[i].display_label.as_str()).collect())
            .collect();
        assert_eq!(labels, vec![vec!["MP"], vec!["MPUU"], vec!["TPUU"]]);
    }

    #[test]
    fn test_nmpc_product_layers() {
        let model = ModelConfiguration::nmpc();
        let levels: Vec<ModelLevel> = model.product_levels().into_iter().cloned().collect();
        let layers = product_layers(&levels, |t| {
            model.parent_levels(t).into_iter().map(|l| l.model_level_type).collect()
        })
        .unwrap();
        let depth_of = |label: &str| {
            layers
                .iter()
                .position(|layer| layer.iter().any(|&i| levels[i].display_label == label))
                .unwrap()
        };
        assert_eq!(depth_of("MP"), 0);
        assert_eq!(depth_of("MPO"), 1);
        assert_eq!(depth_of("CD"), depth_of("RMP"));
        assert_eq!(depth_of("RCD"), 3);
    }
}
