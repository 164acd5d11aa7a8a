//! Client views driven end to end through the loopback service

use std::sync::Arc;

use parking_lot::Mutex;
use rv_core::events::events::WindowInstalled;
use rv_core::events::collect_into;
use rv_core::order::{ColumnSortOrientation, RecordOrder};
use rv_core::schema::{ColumnDescription, ContentsKind, Schema};
use rv_core::{ClientConfig, FindOptions, NavigationError, Session, TableNavigator};
use rv_data::{LoopbackTransport, SourceConfig, Table, TableService};
use serde_json::json;

const ROWS: i64 = 1000;

struct Fixture {
    transport: Arc<LoopbackTransport>,
    session: Session,
    view: TableNavigator,
    installed: Arc<Mutex<Vec<WindowInstalled>>>,
}

impl Fixture {
    /// `ids` 0..1000 with labels "row0000".."row0999", served in four partitions
    fn new() -> Self {
        let service = TableService::with_partitions(4);
        let schema = Schema::new(vec![
            ColumnDescription::new("id", ContentsKind::Integer, false),
            ColumnDescription::new("label", ContentsKind::String, false),
        ]);
        let rows = (0..ROWS)
            .rev()
            .map(|i| vec![json!(i), json!(format!("row{:04}", i))])
            .collect();
        service.register_as("numbers", Table::new(schema, rows).unwrap());
        Self::open(service, "numbers")
    }

    fn open(service: TableService, table: &str) -> Self {
        let transport = Arc::new(LoopbackTransport::held(Arc::new(service)));
        let session = Session::new(transport.clone(), ClientConfig::default());
        let installed = Arc::new(Mutex::new(Vec::new()));
        session
            .event_bus
            .subscribe::<WindowInstalled>(collect_into::<WindowInstalled>(installed.clone()));
        let view = session.open_table(table).unwrap();
        let fixture = Self {
            transport,
            session,
            view,
            installed,
        };
        fixture.settle();
        fixture
    }

    /// Answer everything outstanding, including follow-up requests
    fn settle(&self) {
        loop {
            let released = self.transport.release_all();
            let dispatched = self.session.channel.pump();
            if released == 0 && dispatched == 0 {
                break;
            }
        }
    }

    fn start(&self) -> i64 {
        self.view.window().map(|w| w.start_position).unwrap_or(-1)
    }

    fn first_id(&self) -> serde_json::Value {
        self.view
            .window()
            .and_then(|w| w.first_row().map(|row| row.values[0].clone()))
            .unwrap_or_default()
    }
}

fn id_order(ascending: bool) -> RecordOrder {
    RecordOrder::new(vec![ColumnSortOrientation::new(
        ColumnDescription::new("id", ContentsKind::Integer, false),
        ascending,
    )])
}

#[test]
fn opening_shows_the_first_page() {
    let fixture = Fixture::new();
    let window = fixture.view.window().unwrap();

    assert_eq!(window.start_position, 0);
    assert_eq!(window.total_row_count, ROWS);
    assert_eq!(window.displayed_row_count(), 20);
    assert_eq!(window.rows[0].values, vec![json!(0), json!("row0000")]);
    assert_eq!(fixture.view.summary().map(|s| s.row_count), Some(ROWS));
    assert_eq!(fixture.session.channel.pending_count(), 0);
    assert_eq!(fixture.installed.lock().len(), 1);
}

#[test]
fn page_up_at_top_sends_nothing() {
    let fixture = Fixture::new();

    let result = fixture.view.page_up();
    assert!(matches!(result, Err(NavigationError::AlreadyAtTop)));
    assert!(fixture.transport.held_requests().is_empty());
    assert_eq!(fixture.view.status().as_deref(), Some("Already at the top"));
    assert_eq!(fixture.start(), 0);
}

#[test]
fn page_down_at_bottom_sends_nothing() {
    let fixture = Fixture::new();
    fixture.view.goto_end().unwrap();
    fixture.settle();
    assert_eq!(fixture.start(), ROWS - 20);
    assert_eq!(fixture.first_id(), json!(980));

    let result = fixture.view.page_down();
    assert!(matches!(result, Err(NavigationError::AlreadyAtBottom)));
    assert!(fixture.transport.held_requests().is_empty());
}

#[test]
fn paging_down_and_back_up() {
    let fixture = Fixture::new();

    fixture.view.page_down().unwrap();
    fixture.settle();
    assert_eq!(fixture.start(), 19);
    assert_eq!(fixture.first_id(), json!(19));

    fixture.view.page_up().unwrap();
    fixture.settle();
    assert_eq!(fixture.start(), 0);
    assert_eq!(fixture.first_id(), json!(0));
}

#[test]
fn scrolling_to_the_middle() {
    let fixture = Fixture::new();

    fixture.view.scroll_to_fraction(0.5).unwrap();
    fixture.settle();
    assert_eq!(fixture.start(), 500);
    assert_eq!(fixture.first_id(), json!(500));

    fixture.view.scroll_to_fraction(f64::NAN).unwrap();
    fixture.settle();
    assert_eq!(fixture.start(), 0);
}

#[test]
fn only_the_latest_order_is_installed() {
    let fixture = Fixture::new();
    let before = fixture.installed.lock().len();

    let by_label = RecordOrder::new(vec![ColumnSortOrientation::descending(ColumnDescription::new(
        "label",
        ContentsKind::String,
        false,
    ))]);
    fixture.view.set_order(by_label).unwrap();
    fixture.view.set_order(id_order(false)).unwrap();

    // Answer the newest request first, then whatever is left of the older one
    let ids: Vec<_> = fixture
        .transport
        .held_requests()
        .iter()
        .map(|r| r.request_id)
        .collect();
    for id in ids.into_iter().rev() {
        fixture.transport.release(id);
        fixture.session.channel.pump();
    }
    fixture.settle();

    assert_eq!(fixture.installed.lock().len(), before + 1);
    assert_eq!(fixture.view.order(), id_order(false));
    assert_eq!(fixture.first_id(), json!(999));
}

#[test]
fn find_moves_to_matches() {
    let fixture = Fixture::new();

    fixture.view.find_next("ROW05", FindOptions::default(), false).unwrap();
    fixture.settle();
    assert_eq!(fixture.start(), 500);
    let found = fixture.view.find_result().unwrap();
    assert_eq!((found.before, found.at, found.after), (0, 1, 99));

    // Searching again skips the row the last match put on top
    fixture.view.find_next("ROW05", FindOptions::default(), false).unwrap();
    fixture.settle();
    assert_eq!(fixture.start(), 501);

    fixture.view.find_previous("ROW05", FindOptions::default(), false).unwrap();
    fixture.settle();
    assert_eq!(fixture.start(), 500);
}

#[test]
fn find_without_matches_keeps_window() {
    let fixture = Fixture::new();

    fixture.view.find_next("zzz", FindOptions::default(), false).unwrap();
    fixture.settle();
    assert_eq!(fixture.start(), 0);
    assert_eq!(fixture.view.status().as_deref(), Some("No other matches found."));
}

#[test]
fn unknown_table_becomes_status() {
    let fixture = Fixture::open(TableService::new(), "missing");
    assert!(fixture.view.window().is_none());
    assert_eq!(fixture.view.status().as_deref(), Some("Unknown table missing"));
    assert_eq!(fixture.session.channel.pending_count(), 0);
}

#[test]
fn csv_file_round_trip() {
    let path = std::env::temp_dir().join(format!("rv-nav-{}.csv", uuid::Uuid::new_v4()));
    let mut text = String::from("name,score\n");
    for i in 0..50 {
        text.push_str(&format!("p{:02},{}\n", i, i % 7));
    }
    std::fs::write(&path, text).unwrap();

    let service = TableService::new();
    let id = service.load_csv(&SourceConfig::new(&path)).unwrap();
    std::fs::remove_file(&path).unwrap();

    let fixture = Fixture::open(service, &id);
    let summary = fixture.view.summary().unwrap();
    assert_eq!(summary.row_count, 50);
    assert_eq!(summary.schema.columns()[1].kind, ContentsKind::Integer);

    fixture
        .view
        .sort_first(ColumnSortOrientation::descending(summary.schema.columns()[1].clone()))
        .unwrap();
    fixture.settle();
    let window = fixture.view.window().unwrap();
    assert_eq!(window.rows[0].values, vec![json!(6), json!("p06")]);
}
