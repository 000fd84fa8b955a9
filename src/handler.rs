//! Generic route-handler dispatch: one closed set of handler kinds sharing a
//! two-step lifecycle over an arbitrary [`Model`].
//!
//! Lifecycle: [`RouteHandler::run`] opens a transaction when the kind asks
//! for one, runs [`RouteHandler::prepare`] (the gate), then
//! [`RouteHandler::handle`], and commits or rolls back. `prepare` either
//! terminates the request with a [`Reply`] (not-found, exists) or yields a
//! [`Prepared`] value that is threaded explicitly into `handle` — no shared
//! mutable context between the two steps.

use crate::error::AppError;
use crate::model::{Attrs, Model};
use crate::reply::Reply;
use axum::http::{header::LOCATION, HeaderValue, StatusCode};
use serde_json::Value;
use std::sync::Arc;

/// Builds the `Location` URL for a freshly created resource.
pub type UrlFor = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// The closed set of handler variants. Behavior that differs per variant is a
/// pure function of this tag: transaction opt-in, the existing-resource
/// precondition, and the shape of `handle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    Index,
    Show,
    Create,
    Update,
    Destroy,
    Exists,
}

impl HandlerKind {
    /// Static identifier for diagnostics and routing keys; never control flow.
    pub fn label(self) -> &'static str {
        match self {
            HandlerKind::Index => "index",
            HandlerKind::Show => "show",
            HandlerKind::Create => "create",
            HandlerKind::Update => "update",
            HandlerKind::Destroy => "destroy",
            HandlerKind::Exists => "exists",
        }
    }

    /// Whether `run` opens a transaction around this variant's mutations.
    pub fn requires_transaction(self) -> bool {
        matches!(
            self,
            HandlerKind::Create | HandlerKind::Update | HandlerKind::Destroy
        )
    }

    /// Whether the gate must load the target resource before `handle` runs.
    pub fn loads_resource(self) -> bool {
        matches!(
            self,
            HandlerKind::Show | HandlerKind::Update | HandlerKind::Destroy
        )
    }
}

/// Output of a successful gate: the processed params plus the resource the
/// gate loaded for the existing-resource variants.
pub struct Prepared {
    pub params: Attrs,
    pub resource: Option<Value>,
}

/// Gate outcome: either the request is already answered, or `handle` gets
/// the prepared input.
pub enum Gate {
    Done(Reply),
    Ready(Prepared),
}

/// One handler instance per request, holding the injected collaborators.
pub struct RouteHandler<M: Model> {
    kind: HandlerKind,
    model: M,
    url_for: UrlFor,
}

impl<M: Model> RouteHandler<M> {
    pub fn new(kind: HandlerKind, model: M, url_for: UrlFor) -> Self {
        RouteHandler {
            kind,
            model,
            url_for,
        }
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    /// Full dispatch: gate, optional transaction, handle, commit/rollback.
    ///
    /// The transaction (when required) is open before the gate starts and
    /// stays open through `handle`; it is rolled back if the gate terminates
    /// the request or any step fails, committed otherwise. The handle is
    /// owned by this one invocation and never reused afterwards.
    pub async fn run(&self, params: Attrs) -> Result<Reply, AppError> {
        if !self.kind.requires_transaction() {
            return match self.prepare(params).await? {
                Gate::Done(reply) => Ok(reply),
                Gate::Ready(prepared) => self.handle(&prepared, None).await,
            };
        }

        let mut tx = self.model.begin().await?;
        let prepared = match self.prepare(params).await {
            Ok(Gate::Ready(prepared)) => prepared,
            Ok(Gate::Done(reply)) => {
                self.rollback_logged(tx).await;
                return Ok(reply);
            }
            Err(err) => {
                self.rollback_logged(tx).await;
                return Err(err);
            }
        };
        match self.handle(&prepared, Some(&mut tx)).await {
            Ok(reply) => {
                self.model.commit(tx).await?;
                Ok(reply)
            }
            Err(err) => {
                self.rollback_logged(tx).await;
                Err(err)
            }
        }
    }

    /// Parameter processing, including the per-variant gates.
    ///
    /// Existing-resource variants load the row named by the `id` param; a
    /// missing row or a fetch error terminates with 404 (`handle` never
    /// runs). The exists variant's count is the entire outcome: 200 empty or
    /// 404, the count itself never leaves the gate.
    pub async fn prepare(&self, params: Attrs) -> Result<Gate, AppError> {
        if self.kind == HandlerKind::Exists {
            let id = require_id(&params)?;
            let count = self.model.count_where(self.model.pk_column(), &id).await?;
            return Ok(Gate::Done(if count > 0 {
                Reply::ok(None)
            } else {
                Reply::not_found()
            }));
        }

        if self.kind.loads_resource() {
            let id = require_id(&params)?;
            match self.model.fetch_by_id(&id).await {
                Ok(Some(resource)) => {
                    return Ok(Gate::Ready(Prepared {
                        params,
                        resource: Some(resource),
                    }))
                }
                Ok(None) => {
                    tracing::debug!(handler = self.kind.label(), id = %id, "resource not found");
                    return Ok(Gate::Done(Reply::not_found()));
                }
                Err(err) => {
                    tracing::error!(handler = self.kind.label(), id = %id, error = %err, "resource load failed");
                    return Ok(Gate::Done(Reply::not_found()));
                }
            }
        }

        Ok(Gate::Ready(Prepared {
            params,
            resource: None,
        }))
    }

    /// Variant execution. Callers must respect the gate: a `Done` reply from
    /// `prepare` means this must not run.
    pub async fn handle(
        &self,
        prepared: &Prepared,
        mut tx: Option<&mut M::Tx>,
    ) -> Result<Reply, AppError> {
        match self.kind {
            HandlerKind::Index => {
                let rows = self.model.fetch_all().await?;
                Ok(Reply::ok(Some(Value::Array(rows))))
            }
            HandlerKind::Show => Ok(Reply::ok(Some(self.resource(prepared).clone()))),
            HandlerKind::Create => {
                let tx = self.transaction(&mut tx);
                let saved = self.model.insert(&prepared.params, tx).await?;
                let url = (self.url_for)(&saved);
                let location = HeaderValue::from_str(&url)
                    .map_err(|_| AppError::Internal(format!("invalid location url: {url}")))?;
                Ok(Reply::ok(Some(saved))
                    .with_status(StatusCode::CREATED)
                    .with_header(LOCATION, location))
            }
            HandlerKind::Update => {
                let id = require_id(&prepared.params)?;
                // Identity is immutable through this path.
                let mut changes = prepared.params.clone();
                changes.remove("id");
                let tx = self.transaction(&mut tx);
                let updated = self.model.update(&id, &changes, tx).await?;
                Ok(Reply::ok(Some(updated)))
            }
            HandlerKind::Destroy => {
                let id = require_id(&prepared.params)?;
                let tx = self.transaction(&mut tx);
                self.model.delete(&id, tx).await?;
                Ok(Reply::ok(None))
            }
            // Unreachable through `run`: the exists gate always answers.
            // Kept so the match stays exhaustive with the contract's
            // success shape.
            HandlerKind::Exists => Ok(Reply::ok(None)),
        }
    }

    fn resource<'a>(&self, prepared: &'a Prepared) -> &'a Value {
        match &prepared.resource {
            Some(resource) => resource,
            None => panic!("{} handler ran without a loaded resource", self.kind.label()),
        }
    }

    fn transaction<'a>(&self, tx: &'a mut Option<&mut M::Tx>) -> &'a mut M::Tx {
        match tx {
            Some(tx) => &mut **tx,
            None => panic!("{} handler ran without an open transaction", self.kind.label()),
        }
    }

    async fn rollback_logged(&self, tx: M::Tx) {
        if let Err(err) = self.model.rollback(tx).await {
            tracing::error!(handler = self.kind.label(), error = %err, "rollback failed");
        }
    }
}

fn require_id(params: &Attrs) -> Result<Value, AppError> {
    params
        .get("id")
        .cloned()
        .ok_or_else(|| AppError::BadRequest("missing 'id' parameter".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct TxLog {
        begun: usize,
        committed: usize,
        rolled_back: usize,
    }

    #[derive(Default)]
    struct MockState {
        rows: Vec<Value>,
        tx: TxLog,
        mutations: Vec<&'static str>,
    }

    /// In-memory model with a spy transaction log. Cloning shares state so a
    /// second handler can observe a first handler's effects.
    #[derive(Clone, Default)]
    struct MockModel {
        state: Arc<Mutex<MockState>>,
        fail_insert: bool,
    }

    impl MockModel {
        fn with_rows(rows: Vec<Value>) -> Self {
            let model = MockModel::default();
            model.state.lock().unwrap().rows = rows;
            model
        }

        fn failing_insert() -> Self {
            MockModel {
                fail_insert: true,
                ..MockModel::default()
            }
        }

        fn tx_counts(&self) -> (usize, usize, usize) {
            let s = self.state.lock().unwrap();
            (s.tx.begun, s.tx.committed, s.tx.rolled_back)
        }

        fn mutations(&self) -> Vec<&'static str> {
            self.state.lock().unwrap().mutations.clone()
        }
    }

    #[async_trait]
    impl Model for MockModel {
        type Tx = ();

        fn pk_column(&self) -> &str {
            "id"
        }

        async fn begin(&self) -> Result<(), AppError> {
            self.state.lock().unwrap().tx.begun += 1;
            Ok(())
        }

        async fn commit(&self, _tx: ()) -> Result<(), AppError> {
            self.state.lock().unwrap().tx.committed += 1;
            Ok(())
        }

        async fn rollback(&self, _tx: ()) -> Result<(), AppError> {
            self.state.lock().unwrap().tx.rolled_back += 1;
            Ok(())
        }

        async fn fetch_all(&self) -> Result<Vec<Value>, AppError> {
            Ok(self.state.lock().unwrap().rows.clone())
        }

        async fn fetch_by_id(&self, id: &Value) -> Result<Option<Value>, AppError> {
            let s = self.state.lock().unwrap();
            Ok(s.rows.iter().find(|r| r["id"] == *id).cloned())
        }

        async fn count_where(&self, column: &str, value: &Value) -> Result<u64, AppError> {
            let s = self.state.lock().unwrap();
            Ok(s.rows.iter().filter(|r| r[column] == *value).count() as u64)
        }

        async fn insert(&self, attrs: &Attrs, _tx: &mut ()) -> Result<Value, AppError> {
            if self.fail_insert {
                return Err(AppError::Validation("insert rejected".into()));
            }
            let mut s = self.state.lock().unwrap();
            s.mutations.push("insert");
            let mut row = attrs.clone();
            if !row.contains_key("id") {
                row.insert("id".into(), json!(s.rows.len() as i64 + 1));
            }
            let row = Value::Object(row);
            s.rows.push(row.clone());
            Ok(row)
        }

        async fn update(&self, id: &Value, attrs: &Attrs, _tx: &mut ()) -> Result<Value, AppError> {
            let mut s = self.state.lock().unwrap();
            s.mutations.push("update");
            let row = s
                .rows
                .iter_mut()
                .find(|r| r["id"] == *id)
                .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
            let obj = row.as_object_mut().unwrap();
            for (k, v) in attrs {
                obj.insert(k.clone(), v.clone());
            }
            Ok(row.clone())
        }

        async fn delete(&self, id: &Value, _tx: &mut ()) -> Result<(), AppError> {
            let mut s = self.state.lock().unwrap();
            s.mutations.push("delete");
            s.rows.retain(|r| r["id"] != *id);
            Ok(())
        }
    }

    fn url_for() -> UrlFor {
        Arc::new(|row: &Value| format!("/api/widgets/{}", row["id"]))
    }

    fn handler(kind: HandlerKind, model: MockModel) -> RouteHandler<MockModel> {
        RouteHandler::new(kind, model, url_for())
    }

    fn params(value: Value) -> Attrs {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn transaction_opt_in_is_per_variant() {
        assert!(HandlerKind::Create.requires_transaction());
        assert!(HandlerKind::Update.requires_transaction());
        assert!(HandlerKind::Destroy.requires_transaction());
        assert!(!HandlerKind::Index.requires_transaction());
        assert!(!HandlerKind::Show.requires_transaction());
        assert!(!HandlerKind::Exists.requires_transaction());
    }

    #[test]
    fn labels_are_static_per_variant() {
        assert_eq!(HandlerKind::Index.label(), "index");
        assert_eq!(HandlerKind::Destroy.label(), "destroy");
    }

    #[tokio::test]
    async fn index_returns_collection_in_model_order() {
        let rows = vec![json!({"id": 2, "name": "b"}), json!({"id": 1, "name": "a"})];
        let model = MockModel::with_rows(rows.clone());
        let reply = handler(HandlerKind::Index, model)
            .run(Attrs::new())
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(reply.body(), Some(&Value::Array(rows)));
    }

    #[tokio::test]
    async fn show_returns_loaded_resource() {
        let model = MockModel::with_rows(vec![json!({"id": 1, "name": "a"})]);
        let reply = handler(HandlerKind::Show, model)
            .run(params(json!({"id": 1})))
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(reply.body(), Some(&json!({"id": 1, "name": "a"})));
    }

    #[tokio::test]
    async fn missing_resource_gates_to_404_without_handle() {
        for kind in [HandlerKind::Show, HandlerKind::Update, HandlerKind::Destroy] {
            let model = MockModel::with_rows(vec![json!({"id": 1})]);
            let reply = handler(kind, model.clone())
                .run(params(json!({"id": 99})))
                .await
                .unwrap();
            assert_eq!(reply.status(), StatusCode::NOT_FOUND, "{}", kind.label());
            assert!(model.mutations().is_empty(), "{} mutated", kind.label());
        }
    }

    #[tokio::test]
    async fn gate_terminal_rolls_back_open_transaction() {
        let model = MockModel::with_rows(vec![]);
        let reply = handler(HandlerKind::Destroy, model.clone())
            .run(params(json!({"id": 5})))
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::NOT_FOUND);
        assert_eq!(model.tx_counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn create_returns_201_with_location_and_saved_row() {
        let model = MockModel::default();
        let reply = handler(HandlerKind::Create, model.clone())
            .run(params(json!({"name": "a"})))
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::CREATED);
        let saved = reply.body().unwrap();
        assert_eq!(saved, &json!({"name": "a", "id": 1}));
        assert_eq!(
            reply.header(&LOCATION).unwrap(),
            &HeaderValue::from_str(&format!("/api/widgets/{}", saved["id"])).unwrap()
        );
        assert_eq!(model.tx_counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn update_merges_fields_and_ignores_payload_id() {
        let model = MockModel::with_rows(vec![json!({"id": 7, "a": 1, "b": 2})]);
        let reply = handler(HandlerKind::Update, model.clone())
            .run(params(json!({"id": 7, "a": 9})))
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(reply.body(), Some(&json!({"id": 7, "a": 9, "b": 2})));
        let persisted = model.fetch_by_id(&json!(7)).await.unwrap().unwrap();
        assert_eq!(persisted, json!({"id": 7, "a": 9, "b": 2}));
        assert_eq!(model.tx_counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn destroy_empties_body_and_subsequent_exists_is_404() {
        let model = MockModel::with_rows(vec![json!({"id": 3})]);
        let reply = handler(HandlerKind::Destroy, model.clone())
            .run(params(json!({"id": 3})))
            .await
            .unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert!(reply.body().is_none());
        assert_eq!(model.tx_counts(), (1, 1, 0));

        let exists = handler(HandlerKind::Exists, model)
            .run(params(json!({"id": 3})))
            .await
            .unwrap();
        assert_eq!(exists.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn exists_answers_from_the_gate_without_a_count_in_the_body() {
        let model = MockModel::with_rows(vec![json!({"id": 1}), json!({"id": 1})]);
        let hit = handler(HandlerKind::Exists, model.clone())
            .run(params(json!({"id": 1})))
            .await
            .unwrap();
        assert_eq!(hit.status(), StatusCode::OK);
        assert!(hit.body().is_none());

        let miss = handler(HandlerKind::Exists, model)
            .run(params(json!({"id": 2})))
            .await
            .unwrap();
        assert_eq!(miss.status(), StatusCode::NOT_FOUND);
        assert!(miss.body().is_none());
    }

    #[tokio::test]
    async fn rejected_insert_rolls_back_and_yields_no_success() {
        let model = MockModel::failing_insert();
        let err = handler(HandlerKind::Create, model.clone())
            .run(params(json!({"name": "a"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(model.tx_counts(), (1, 0, 1));
    }
}
