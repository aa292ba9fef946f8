//! Read flow: an existing package concept becomes a product graph

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio::task::JoinSet;
use tracing::debug;

use super::join_all_or_abort;
use crate::error::{CompilerError, CompilerResult};
use crate::graph::{EdgeLabel, Identifier, Node, ProductGraph};
use crate::model::constants::CONTAINS_CD;
use crate::model::{ModelLevel, ModelLevelType};
use crate::resolver::ConceptResolver;

type GraphFuture = Pin<Box<dyn Future<Output = CompilerResult<ProductGraph>> + Send>>;

#[derive(Clone)]
pub(crate) struct ReadFlow {
    resolver: ConceptResolver,
}

impl ReadFlow {
    pub(crate) fn new(resolver: ConceptResolver) -> Self {
        Self { resolver }
    }

    pub(crate) fn package_graph(self, package_id: String) -> GraphFuture {
        Box::pin(async move { self.read_package(package_id).await })
    }

    /// Nodes for every level of one hierarchy, keyed by level type
    async fn read_levels(&self, root_id: &str, levels: Vec<ModelLevel>) -> CompilerResult<HashMap<ModelLevelType, Node>> {
        let mut tasks = JoinSet::new();
        for (index, level) in levels.into_iter().enumerate() {
            let resolver = self.resolver.clone();
            let root = root_id.to_string();
            tasks.spawn(async move { resolver.look_up_node(&root, &level).await.map(|n| (index, n)) });
        }
        Ok(join_all_or_abort(tasks)
            .await?
            .into_iter()
            .map(|n| (n.model_level, n))
            .collect())
    }

    /// Product name of a branded concept, if the model has that level and the concept names one
    async fn product_name(&self, concept_id: &str) -> CompilerResult<Option<Node>> {
        let Some(level) = self.resolver.context().model.level_of_type(ModelLevelType::ProductName) else {
            return Ok(None);
        };
        let Some(ecl) = level.ecl_for(concept_id) else {
            return Ok(None);
        };
        let names = self.resolver.related_concepts(&ecl, &level.display_label).await?;
        match names.as_slice() {
            [] => Ok(None),
            [name] => self.resolver.fetch_node(&name.concept_id, level).await.map(Some),
            _ => Err(CompilerError::Validation(format!(
                "expected at most 1 {} for {} but found {}",
                level.display_label,
                concept_id,
                names.len()
            ))),
        }
    }

    fn add_level_nodes(
        &self,
        graph: &mut ProductGraph,
        nodes: &HashMap<ModelLevelType, Node>,
        name: Option<Node>,
    ) -> CompilerResult<()> {
        let model = &self.resolver.context().model;
        for level in &model.levels {
            if let Some(node) = nodes.get(&level.model_level_type) {
                graph.add_node(node.clone())?;
            }
        }
        for node in nodes.values() {
            for parent in model.parent_levels(node.model_level) {
                if let Some(parent_node) = nodes.get(&parent.model_level_type) {
                    graph.add_edge(&node.concept_id, &parent_node.concept_id, EdgeLabel::IsA);
                }
            }
        }
        if let Some(name) = name {
            let name_id = name.concept_id.clone();
            graph.add_node(name)?;
            for node in nodes.values().filter(|n| n.model_level.is_branded()) {
                graph.add_edge(&node.concept_id, &name_id, EdgeLabel::HasProductName);
            }
        }
        Ok(())
    }

    async fn read_product(&self, product_id: String) -> CompilerResult<ProductGraph> {
        let model = self.resolver.context().model.clone();
        let levels: Vec<ModelLevel> = model.product_levels().into_iter().cloned().collect();
        let (nodes, name) = tokio::try_join!(
            self.read_levels(&product_id, levels),
            self.product_name(&product_id)
        )?;
        let mut graph = ProductGraph::new();
        self.add_level_nodes(&mut graph, &nodes, name)?;
        graph.set_single_subject(&Identifier::real(product_id))?;
        Ok(graph)
    }

    async fn read_package(self, package_id: String) -> CompilerResult<ProductGraph> {
        let ctx = self.resolver.context().clone();
        ctx.check_cancelled()?;
        let model = ctx.model.clone();
        let levels: Vec<ModelLevel> = model.package_levels().into_iter().cloned().collect();

        let contained_ecl = format!("{}.{}", package_id, CONTAINS_CD);
        let subpack_ecl = model
            .subpack_from_package_ecl
            .as_ref()
            .map(|ecl| ecl.replace("<id>", &package_id));
        let subpacks = async {
            match &subpack_ecl {
                Some(ecl) => self.resolver.related_concepts(ecl, "subpack").await,
                None => Ok(Vec::new()),
            }
        };
        let (nodes, name, products, subpacks) = tokio::try_join!(
            self.read_levels(&package_id, levels.clone()),
            self.product_name(&package_id),
            self.resolver.related_concepts(&contained_ecl, "contained product"),
            subpacks
        )?;

        let mut tasks = JoinSet::new();
        for (index, product) in products.iter().enumerate() {
            let flow = self.clone();
            let id = product.concept_id.clone();
            tasks.spawn(async move { flow.read_product(id).await.map(|g| (index, (false, g))) });
        }
        let offset = products.len();
        for (index, subpack) in subpacks.iter().enumerate() {
            let inner = self.clone().package_graph(subpack.concept_id.clone());
            tasks.spawn(async move { inner.await.map(|g| (offset + index, (true, g))) });
        }
        let inner_graphs = join_all_or_abort(tasks).await?;

        let mut graph = ProductGraph::new();
        self.add_level_nodes(&mut graph, &nodes, name)?;

        for level in &levels {
            let Some(source) = nodes.get(&level.model_level_type).map(|n| n.concept_id.clone()) else {
                continue;
            };
            let product_label = level
                .model_level_type
                .contained_product_level()
                .and_then(|t| model.level_of_type(t))
                .map(|l| l.display_label.clone());
            for (is_package, inner) in &inner_graphs {
                let label = if *is_package {
                    Some(level.display_label.clone())
                } else {
                    product_label.clone()
                };
                let Some(label) = label else { continue };
                for target in inner.nodes_with_label(&label) {
                    graph.add_edge(&source, &target.concept_id, EdgeLabel::Contains);
                }
            }
        }
        for (_, inner) in inner_graphs {
            graph.merge(inner)?;
        }
        graph.calculate_subject(&model.leaf_package_level()?.display_label, true)?;
        let subject = &graph.single_subject()?.concept_id;
        if subject.as_real() != Some(package_id.as_str()) {
            return Err(CompilerError::Validation(format!(
                "{} is not the outermost package of its graph, {} is",
                package_id, subject
            )));
        }
        debug!(
            "Read package {} with {} products and {} subpacks",
            package_id,
            products.len(),
            subpacks.len()
        );
        Ok(graph)
    }
}
