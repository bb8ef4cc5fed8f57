use crate::engine::{
    HnswParameters, IndexDefinition, SearchField, SearchFieldDataType, VectorSearch,
    VectorSearchAlgorithm, VectorSearchProfile,
};
use searchmem_core::{
    FieldType, MemoryDbField, MemoryDbSchema, SearchMemError, SearchMemResult, VectorMetric,
};

/// Name of the HNSW configuration shared by every vector field.
pub const VECTOR_SEARCH_ALGORITHM: &str = "searchmem-hnsw";
/// Name of the profile that binds vector fields to [`VECTOR_SEARCH_ALGORITHM`].
pub const VECTOR_SEARCH_PROFILE: &str = "searchmem-vector-profile";

/// Turns an abstract [`MemoryDbSchema`] into one engine's index definition.
pub trait IndexSchemaCompiler {
    /// The engine-specific definition produced.
    type Output;

    fn compile(&self, index_name: &str, schema: &MemoryDbSchema) -> SearchMemResult<Self::Output>;
}

/// Compiles schemas into Azure AI Search index definitions.
///
/// Vector fields always use an HNSW graph with cosine distance, whatever
/// metric the schema declares; the declared metric is only checked for
/// validity. The vector field is emitted last.
#[derive(Debug, Clone, Copy, Default)]
pub struct AzureSchemaCompiler;

impl IndexSchemaCompiler for AzureSchemaCompiler {
    type Output = IndexDefinition;

    fn compile(&self, index_name: &str, schema: &MemoryDbSchema) -> SearchMemResult<IndexDefinition> {
        schema.validate()?;

        let mut fields = Vec::with_capacity(schema.fields.len());
        let mut vector_field = None;

        for field in &schema.fields {
            match field.field_type {
                FieldType::Vector => vector_field = Some(compile_vector(field)?),
                FieldType::Text => fields.push(compile_scalar(field, SearchFieldDataType::String)?),
                FieldType::Integer => fields.push(compile_scalar(field, SearchFieldDataType::Int64)?),
                FieldType::Decimal => fields.push(compile_scalar(field, SearchFieldDataType::Double)?),
                FieldType::Bool => fields.push(compile_scalar(field, SearchFieldDataType::Boolean)?),
                FieldType::ListOfStrings => {
                    fields.push(compile_scalar(field, SearchFieldDataType::StringCollection)?);
                }
            }
        }

        // validate() guarantees exactly one vector field.
        fields.extend(vector_field);

        Ok(IndexDefinition {
            name: index_name.to_string(),
            fields,
            vector_search: Some(hnsw_cosine()),
        })
    }
}

fn hnsw_cosine() -> VectorSearch {
    VectorSearch {
        algorithms: vec![VectorSearchAlgorithm {
            name: VECTOR_SEARCH_ALGORITHM.to_string(),
            kind: "hnsw".to_string(),
            hnsw_parameters: HnswParameters {
                m: 4,
                ef_construction: 400,
                ef_search: 500,
                metric: "cosine".to_string(),
            },
        }],
        profiles: vec![VectorSearchProfile {
            name: VECTOR_SEARCH_PROFILE.to_string(),
            algorithm: VECTOR_SEARCH_ALGORITHM.to_string(),
        }],
    }
}

fn compile_vector(field: &MemoryDbField) -> SearchMemResult<SearchField> {
    match field.vector_metric {
        Some(VectorMetric::Cosine | VectorMetric::Euclidean | VectorMetric::DotProduct) => {}
        None => {
            return Err(SearchMemError::UnsupportedVectorMetric(format!(
                "vector field '{}' declares no metric",
                field.name
            )))
        }
    }
    if field.vector_size == 0 {
        return Err(SearchMemError::InvalidSchema(format!(
            "vector field '{}' has no size",
            field.name
        )));
    }

    Ok(SearchField {
        name: field.name.clone(),
        data_type: SearchFieldDataType::SingleCollection,
        key: false,
        searchable: true,
        filterable: false,
        sortable: false,
        facetable: false,
        retrievable: true,
        dimensions: Some(field.vector_size),
        vector_search_profile: Some(VECTOR_SEARCH_PROFILE.to_string()),
    })
}

fn compile_scalar(field: &MemoryDbField, data_type: SearchFieldDataType) -> SearchMemResult<SearchField> {
    if field.is_key && data_type != SearchFieldDataType::String {
        return Err(SearchMemError::InvalidSchema(format!(
            "key field '{}' must be text, found {}",
            field.name, field.field_type
        )));
    }

    Ok(SearchField {
        name: field.name.clone(),
        data_type,
        key: field.is_key,
        // The engine rejects indexes without a searchable string field, so the
        // key is marked searchable although no lexical query targets it.
        searchable: field.is_key,
        filterable: field.is_key || field.is_filterable,
        sortable: false,
        facetable: false,
        retrievable: true,
        dimensions: None,
        vector_search_profile: None,
    })
}
