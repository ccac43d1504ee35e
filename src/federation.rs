use tracing::info;

use crate::{
    config::FederationConfig,
    coordinator::Coordinator,
    dataset::Dataset,
    document::DocumentStore,
    errors::FederationResult,
    graph::GraphStore,
    relational::RelationalStore,
};

/// Owns the three store adapters for the lifetime of the process.
pub struct Federation {
    pub relational: RelationalStore,
    pub document: DocumentStore,
    pub graph: GraphStore,
}

impl Federation {
    pub fn open(config: &FederationConfig) -> FederationResult<Self> {
        config.validate()?;
        let federation = Self {
            relational: RelationalStore::open(config.relational.clone())?,
            document: DocumentStore::open(config.document.clone())?,
            graph: GraphStore::open(config.graph.clone())?,
        };
        info!("federation opened");
        Ok(federation)
    }

    pub fn open_in_memory() -> FederationResult<Self> {
        Self::open(&FederationConfig::default())
    }

    /// Loads the same dataset into every store. Each store replaces its
    /// contents in its own transaction.
    pub fn load(&self, dataset: &Dataset) -> FederationResult<()> {
        dataset.validate()?;
        self.relational.load_dataset(dataset)?;
        self.document.load_dataset(dataset)?;
        self.graph.load_dataset(dataset)?;
        info!(
            universities = dataset.universities.len(),
            faculty = dataset.faculty.len(),
            publications = dataset.publications.len(),
            "dataset loaded into all stores"
        );
        Ok(())
    }

    pub fn coordinator(&self) -> Coordinator<'_> {
        Coordinator::new(&self.relational, &self.document, &self.graph)
    }

    pub fn close(&self) {
        self.relational.close();
        self.document.close();
        self.graph.close();
    }
}
