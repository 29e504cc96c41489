//! Library-level flow: catalog records → in-memory index → retrieval →
//! correction, with no database or network.

use std::sync::Arc;

use query_harness::catalog::parse_catalog;
use query_harness::classifier::SoftmaxClassifier;
use query_harness::llm::{document_prompt, sql_prompt};
use query_harness_core::index::memory::InMemoryIndex;
use query_harness_core::retrieval::{TableClassifier, TableRetriever};
use query_harness_core::sql::validate::validate;
use query_harness_core::{correct, CorrectionError, CorrectionOptions, RetrievalResult};

const CATALOG: &str = r#"[
  {"id": "sisplan.clientes", "text": "Cadastro de clientes",
   "columns": "[{\"name\": \"status\", \"type\": \"varchar\"}, {\"name\": \"nome\", \"type\": \"text\"}, {\"name\": \"ativo\", \"type\": \"varchar(1)\"}]"},
  {"id": "sisplan.pedidos", "text": "Pedidos de venda",
   "columns": [{"name": "codcli", "type": "bigint"}, {"name": "valor", "type": "numeric"}]},
  {"id": "doc:manual", "text": "Para emitir uma nota, acesse Faturamento > Notas."}
]"#;

fn build_index() -> InMemoryIndex {
    let vectors = [
        ("sisplan.clientes", vec![1.0, 0.0, 0.0]),
        ("sisplan.pedidos", vec![0.0, 1.0, 0.0]),
        ("doc:manual", vec![0.0, 0.0, 1.0]),
    ];
    let index = InMemoryIndex::new();
    for record in parse_catalog(CATALOG).unwrap() {
        let vector = vectors
            .iter()
            .find(|(id, _)| *id == record.id)
            .map(|(_, v)| v.clone());
        index
            .insert(&record.id, &record.text, record.metadata, vector)
            .unwrap();
    }
    index
}

#[tokio::test]
async fn test_vector_retrieval_feeds_correction() {
    let index = build_index();
    let retriever = TableRetriever::new(&index);

    let result = retriever
        .resolve("clientes ativos", Some(&[0.9, 0.1, 0.0]), 3)
        .await;
    let tables = result.tables();
    assert_eq!(tables[0].id, "sisplan.clientes");

    let prompt = sql_prompt("clientes ativos", tables);
    assert!(prompt.contains("Columns: status, nome, ativo"));

    let reply = "```sql\nSELECT nome FROM clientes c WHERE c.ativo = true AND c.valor > 10\n```";
    let sql = correct(reply, tables, &CorrectionOptions::default()).unwrap();
    assert_eq!(sql, "SELECT nome FROM sisplan.clientes c WHERE c.ativo = 'S';");
}

#[tokio::test]
async fn test_classifier_overrides_vector_ranking() {
    let index = build_index();
    let classifier: Arc<dyn TableClassifier> = Arc::new(
        SoftmaxClassifier::from_json(
            r#"{"labels": ["sisplan.clientes", "sisplan.pedidos"],
                "coef": [[0.0, 0.0, 0.0], [0.0, 0.0, 4.0]],
                "intercept": [0.0, 0.0]}"#,
        )
        .unwrap(),
    );
    let retriever = TableRetriever::new(&index).with_classifier(Some(classifier));

    // The vector points at the manual, but the classifier is confident.
    let result = retriever.resolve("valor dos pedidos", Some(&[0.0, 0.0, 1.0]), 2).await;
    let tables = result.tables();
    assert_eq!(tables[0].id, "sisplan.pedidos");
    assert!(tables[0].relevance_score > 0.9);

    let sql = correct(
        "SELECT SUM(valor) FROM pedidos WHERE codcli = 'abc';",
        tables,
        &CorrectionOptions::default(),
    )
    .unwrap();
    assert_eq!(sql, "SELECT SUM(valor) FROM sisplan.pedidos WHERE 1=1;");
}

#[tokio::test]
async fn test_document_hits_route_to_answering() {
    let index = build_index();
    let retriever = TableRetriever::new(&index);

    let result = retriever.resolve("como emitir nota", Some(&[0.0, 0.1, 1.0]), 1).await;
    let RetrievalResult::Document(documents) = result else {
        panic!("expected documents, got {result:?}");
    };
    let prompt = document_prompt("como emitir nota", &documents);
    assert!(prompt.contains("Faturamento > Notas"));
}

#[test]
fn test_documented_example_end_to_end() {
    let index_contexts = vec![query_harness_core::TableContext::new(
        "sisplan.clientes",
        vec![
            query_harness_core::ColumnSpec::new("status", "varchar"),
            query_harness_core::ColumnSpec::new("nome", "text"),
        ],
    )];

    let raw = "SELECT * FROM clientes WHERE cli.status = 1 AND nome_inexistente = 'x';";
    let sql = correct(raw, &index_contexts, &CorrectionOptions::default()).unwrap();
    assert_eq!(sql, "SELECT * FROM sisplan.clientes;");

    let unfiltered = "SELECT * FROM sisplan.clientes WHERE nome_inexistente = 'x'";
    assert_eq!(
        validate(unfiltered, &index_contexts),
        Err(CorrectionError::UnknownColumnReference {
            token: "nome_inexistente".to_string()
        })
    );
}
