use std::sync::{Arc, Mutex};
use std::time::Duration;

use apache_avro::types::Value;
use async_trait::async_trait;
use common_s3::MockS3Client;
use csv_producer::{
    discovery::{DiscoveryConfig, DiscoveryLoop},
    encode::{BatchEncoder, EncodedMessage},
    error::PublishError,
    extract::RowExtractor,
    processor::{FileProcessor, ProcessorConfig},
    publish::Publisher,
    schema::{SchemaDefinition, SchemaFilter},
};
use encoding_rs::WINDOWS_1252;

const BUCKET: &str = "ranking";
const TOPIC: &str = "reclamacoes";

const HEADER: &str = "Ano;Trimestre;Categoria;Tipo;CNPJ IF;Instituição financeira;Índice;\
Quantidade de reclamações reguladas procedentes;Quantidade de reclamações reguladas - outras;\
Quantidade de reclamações não reguladas;Quantidade total de reclamações;\
Quantidade total de clientes – CCS e SCR;Quantidade de clientes – CCS;\
Quantidade de clientes – SCR;Observação\n";

#[derive(Default)]
struct CapturingPublisher {
    published: Mutex<Vec<(String, Vec<EncodedMessage>)>>,
}

impl CapturingPublisher {
    fn messages(&self) -> Vec<EncodedMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, batch)| batch.clone())
            .collect()
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, batch)| batch.len())
            .collect()
    }
}

#[async_trait]
impl Publisher for CapturingPublisher {
    async fn publish(
        &self,
        topic: &str,
        messages: Vec<EncodedMessage>,
    ) -> Result<usize, PublishError> {
        let sent = messages.len();
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), messages));
        Ok(sent)
    }
}

fn bundled_schema() -> Arc<SchemaDefinition> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/schemas/reclamacoes.avsc");
    Arc::new(SchemaDefinition::load(path).unwrap())
}

fn latin1(text: &str) -> Vec<u8> {
    let (bytes, _, had_errors) = WINDOWS_1252.encode(text);
    assert!(!had_errors);
    bytes.into_owned()
}

fn complaints_file(rows: usize) -> Vec<u8> {
    let mut content = String::from(HEADER);
    for i in 0..rows {
        content.push_str(&format!(
            "2024;1º;Demais bancos;Banco;{:08};Banco Número {};;{};0;2;{};1000;600;400;sem observação\n",
            i,
            i,
            i,
            i + 2
        ));
    }
    latin1(&content)
}

fn discovery(
    store: MockS3Client,
    publisher: Arc<CapturingPublisher>,
    chunk_size: usize,
) -> DiscoveryLoop {
    let schema = bundled_schema();
    let store = Arc::new(store);
    let processor = FileProcessor::new(
        store.clone(),
        RowExtractor::new(SchemaFilter::new(schema.clone()), b';'),
        BatchEncoder::new(schema),
        publisher,
        ProcessorConfig {
            bucket: BUCKET.to_string(),
            topic: TOPIC.to_string(),
            chunk_size,
            chunk_delay: Duration::ZERO,
        },
    );

    DiscoveryLoop::new(
        store,
        processor,
        DiscoveryConfig {
            bucket: BUCKET.to_string(),
            prefix: "2024/".to_string(),
            extension: ".csv".to_string(),
            poll_interval: Duration::ZERO,
        },
    )
}

fn decode(schema: &SchemaDefinition, message: &EncodedMessage) -> Vec<(String, Value)> {
    match apache_avro::from_avro_datum(schema.avro_schema(), &mut message.as_bytes(), None) {
        Ok(Value::Record(fields)) => fields,
        other => panic!("expected a record, got {other:?}"),
    }
}

fn field<'a>(record: &'a [(String, Value)], name: &str) -> &'a Value {
    &record
        .iter()
        .find(|(n, _)| n == name)
        .unwrap_or_else(|| panic!("no field {name}"))
        .1
}

fn some(value: Value) -> Value {
    Value::Union(1, Box::new(value))
}

#[tokio::test]
async fn test_publishes_latin1_file_as_avro_records() {
    let store = MockS3Client::new().with_object(BUCKET, "2024/ranking.csv", complaints_file(3));
    let publisher = Arc::new(CapturingPublisher::default());

    let reports = discovery(store, publisher.clone(), 10).run_passes(1).await;
    assert_eq!(reports[0].completed(), 1);

    let schema = bundled_schema();
    let messages = publisher.messages();
    assert_eq!(messages.len(), 3);

    let record = decode(&schema, &messages[1]);
    let names: Vec<&str> = record.iter().map(|(n, _)| n.as_str()).collect();
    let declared: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, declared);

    assert_eq!(field(&record, "ano"), &some(Value::Int(2024)));
    assert_eq!(field(&record, "trimestre"), &some(Value::String("1º".to_string())));
    assert_eq!(
        field(&record, "instituicao_financeira"),
        &some(Value::String("Banco Número 1".to_string()))
    );
    assert_eq!(field(&record, "cnpj_if"), &some(Value::String("00000001".to_string())));
    assert_eq!(field(&record, "indice"), &Value::Union(0, Box::new(Value::Null)));
    assert_eq!(
        field(&record, "quantidade_total_de_reclamacoes"),
        &some(Value::Int(3))
    );
    assert_eq!(
        field(&record, "quantidade_total_de_clientes_ccs_e_scr"),
        &some(Value::Int(1000))
    );
    assert_eq!(field(&record, "quantidade_de_clientes_scr"), &some(Value::Int(400)));
}

#[tokio::test]
async fn test_large_file_is_split_into_chunks_on_one_topic() {
    let store = MockS3Client::new().with_object(BUCKET, "2024/ranking.csv", complaints_file(25));
    let publisher = Arc::new(CapturingPublisher::default());

    let reports = discovery(store, publisher.clone(), 10).run_passes(1).await;

    let file = &reports[0].files[0];
    assert!(file.is_completed());
    assert_eq!(file.rows, 25);
    assert_eq!(file.chunks_published, 3);
    assert_eq!(publisher.batch_sizes(), vec![10, 10, 5]);
    assert!(publisher
        .published
        .lock()
        .unwrap()
        .iter()
        .all(|(topic, _)| topic == TOPIC));
}

#[tokio::test]
async fn test_bad_file_is_isolated_from_the_next_one() {
    let mut broken = complaints_file(2);
    broken.extend_from_slice(&latin1("dois mil;1º;x;y;z;w;;1;1;1;1;1;1;1;\n"));
    let store = MockS3Client::new()
        .with_object(BUCKET, "2024/a.csv", broken)
        .with_object(BUCKET, "2024/b.csv", complaints_file(4))
        .with_object(BUCKET, "2024/leia-me.txt", "ignore me");
    let publisher = Arc::new(CapturingPublisher::default());

    let reports = discovery(store.clone(), publisher.clone(), 10).run_passes(1).await;
    let pass = &reports[0];

    assert_eq!(pass.files.len(), 2);
    assert_eq!(pass.files[0].key, "2024/a.csv");
    assert!(!pass.files[0].is_completed());
    assert_eq!(pass.files[0].chunks_published, 0);
    assert!(pass.files[1].is_completed());
    assert_eq!(publisher.batch_sizes(), vec![4]);
    assert_eq!(
        store.fetched_keys(),
        vec!["2024/a.csv".to_string(), "2024/b.csv".to_string()]
    );
}
