//! Интеграционные тесты движка бронирования поверх in-memory хранилища.
//!
//! The in-memory backend implements the same atomic contract as Postgres, so
//! every property here is a property of the engine, not of a backend detail.

use std::sync::Arc;

use futures::future::join_all;

use seat_booking::error::SeatingError;
use seat_booking::models::{BookingStatus, CategoryDef, SeatLayout, SeatStatus};
use seat_booking::services::ReservationEngine;
use seat_booking::store::MemorySeatStore;

type Engine = ReservationEngine<MemorySeatStore>;

fn def(name: &str, price: f64, rows: &[&str], seats_per_row: i32) -> CategoryDef {
    CategoryDef {
        name: name.to_string(),
        price,
        color: "#f59e0b".to_string(),
        rows: rows.iter().map(|r| r.to_string()).collect(),
        seats_per_row,
        aisle_after: vec![],
    }
}

// VIP: ряд A по 100, General: ряды B и C по 50 — 15 мест
fn standard_defs() -> Vec<CategoryDef> {
    vec![
        def("VIP", 100.0, &["A"], 5),
        def("General", 50.0, &["B", "C"], 5),
    ]
}

async fn engine_with_layout(event_id: i64) -> (Arc<Engine>, SeatLayout) {
    let engine = Arc::new(ReservationEngine::new(MemorySeatStore::new()));
    let layout = engine
        .build_layout(event_id, &standard_defs())
        .await
        .expect("layout should build");
    (engine, layout)
}

fn seat_id(layout: &SeatLayout, label: &str) -> i64 {
    layout
        .seats
        .iter()
        .find(|s| s.label() == label)
        .unwrap_or_else(|| panic!("no seat {label}"))
        .id
}

#[tokio::test]
async fn scenario_reserve_and_conflict() {
    let (engine, layout) = engine_with_layout(1).await;
    assert_eq!(layout.total_seats(), 15);

    let a1 = seat_id(&layout, "A1");
    let a2 = seat_id(&layout, "A2");
    let a3 = seat_id(&layout, "A3");

    let booking = engine.reserve_seats(1, 10, &[a1, a2]).await.unwrap();
    assert_eq!(booking.total_amount, 200.0);
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.seat_ids, vec![a1, a2]);

    // Второй покупатель просит A2 и A3 — отказ называет ровно A2
    match engine.reserve_seats(1, 11, &[a2, a3]).await {
        Err(SeatingError::SeatsUnavailable { seat_ids }) => assert_eq!(seat_ids, vec![a2]),
        other => panic!("expected SeatsUnavailable, got {other:?}"),
    }

    // A3 осталось свободным: отказ был атомарным
    let layout = engine.layout(1).await.unwrap();
    assert_eq!(layout.seat(a3).unwrap().status, SeatStatus::Available);
    assert_eq!(layout.seat(a1).unwrap().status, SeatStatus::Booked);
    assert_eq!(layout.seat(a1).unwrap().booking_id, Some(booking.id));
}

#[tokio::test]
async fn booking_is_all_or_nothing() {
    let (engine, layout) = engine_with_layout(2).await;
    let b1 = seat_id(&layout, "B1");
    let b2 = seat_id(&layout, "B2");
    let b3 = seat_id(&layout, "B3");

    engine.reserve_seats(2, 1, &[b2]).await.unwrap();

    // Запрос с одним занятым местом не трогает остальные
    assert!(engine.reserve_seats(2, 2, &[b1, b2, b3]).await.is_err());

    let layout = engine.layout(2).await.unwrap();
    assert_eq!(layout.seat(b1).unwrap().status, SeatStatus::Available);
    assert_eq!(layout.seat(b3).unwrap().status, SeatStatus::Available);
}

#[tokio::test]
async fn unknown_seats_are_an_input_error() {
    let (engine, layout) = engine_with_layout(3).await;
    let a1 = seat_id(&layout, "A1");

    match engine.reserve_seats(3, 1, &[a1, 999]).await {
        Err(SeatingError::UnknownSeats { seat_ids, .. }) => assert_eq!(seat_ids, vec![999]),
        other => panic!("expected UnknownSeats, got {other:?}"),
    }

    // Существующее место из того же запроса не забронировано
    let layout = engine.layout(3).await.unwrap();
    assert_eq!(layout.seat(a1).unwrap().status, SeatStatus::Available);
}

#[tokio::test]
async fn concurrent_overlapping_requests_have_disjoint_winners() {
    let (engine, layout) = engine_with_layout(4).await;

    // Цепочка пересекающихся пар: {B1,B2}, {B2,B3}, ... {C4,C5}
    let ids: Vec<i64> = layout
        .seats
        .iter()
        .filter(|s| s.row_label != "A")
        .map(|s| s.id)
        .collect();

    let mut handles = Vec::new();
    for (i, pair) in ids.windows(2).enumerate() {
        let engine = engine.clone();
        let pair = pair.to_vec();
        handles.push(tokio::spawn(async move {
            engine.reserve_seats(4, i as i64 + 1, &pair).await
        }));
    }

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();

    let mut booked_by_winners = Vec::new();
    for result in &results {
        if let Ok(booking) = result {
            booked_by_winners.extend(booking.seat_ids.clone());
        }
    }

    // Ни одно место не встречается в двух выигравших бронях
    let mut deduped = booked_by_winners.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), booked_by_winners.len());

    // Финальное состояние сетки согласовано с победителями
    let layout = engine.layout(4).await.unwrap();
    for seat in &layout.seats {
        if booked_by_winners.contains(&seat.id) {
            assert_eq!(seat.status, SeatStatus::Booked);
        } else {
            assert_eq!(seat.status, SeatStatus::Available);
            assert_eq!(seat.booking_id, None);
        }
    }
}

#[tokio::test]
async fn same_pair_has_exactly_one_winner() {
    let (engine, layout) = engine_with_layout(5).await;
    let a1 = seat_id(&layout, "A1");
    let a2 = seat_id(&layout, "A2");

    let handles: Vec<_> = (0..10)
        .map(|user| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.reserve_seats(5, user, &[a1, a2]).await })
        })
        .collect();

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);

    // Проигравшие получили отказ с перечислением конфликтных мест
    for result in results.iter().filter(|r| r.is_err()) {
        match result {
            Err(SeatingError::SeatsUnavailable { seat_ids }) => {
                assert_eq!(seat_ids, &vec![a1, a2]);
            }
            other => panic!("expected SeatsUnavailable, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn cancellation_frees_seats_for_rebooking() {
    let (engine, layout) = engine_with_layout(6).await;
    let c1 = seat_id(&layout, "C1");
    let c2 = seat_id(&layout, "C2");

    let booking = engine.reserve_seats(6, 1, &[c1, c2]).await.unwrap();
    let cancelled = engine.cancel_booking(booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    let layout = engine.layout(6).await.unwrap();
    assert_eq!(layout.seat(c1).unwrap().status, SeatStatus::Available);
    assert_eq!(layout.seat(c1).unwrap().booking_id, None);

    // Другой пользователь может забронировать те же места
    let rebooked = engine.reserve_seats(6, 2, &[c1, c2]).await.unwrap();
    assert_eq!(rebooked.user_id, 2);
    assert_eq!(rebooked.total_amount, 100.0);
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let (engine, layout) = engine_with_layout(7).await;
    let a1 = seat_id(&layout, "A1");

    let booking = engine.reserve_seats(7, 1, &[a1]).await.unwrap();
    engine.cancel_booking(booking.id).await.unwrap();

    // Повторная отмена — успех без изменений
    let second = engine.cancel_booking(booking.id).await.unwrap();
    assert_eq!(second.status, BookingStatus::Cancelled);

    let layout = engine.layout(7).await.unwrap();
    assert_eq!(layout.seat(a1).unwrap().status, SeatStatus::Available);
}

#[tokio::test]
async fn stale_cancel_does_not_steal_rebooked_seats() {
    let (engine, layout) = engine_with_layout(8).await;
    let a1 = seat_id(&layout, "A1");

    let first = engine.reserve_seats(8, 1, &[a1]).await.unwrap();
    engine.cancel_booking(first.id).await.unwrap();
    let second = engine.reserve_seats(8, 2, &[a1]).await.unwrap();

    // Отмена уже отменённой брони не освобождает чужое место
    engine.cancel_booking(first.id).await.unwrap();

    let layout = engine.layout(8).await.unwrap();
    assert_eq!(layout.seat(a1).unwrap().status, SeatStatus::Booked);
    assert_eq!(layout.seat(a1).unwrap().booking_id, Some(second.id));
}

#[tokio::test]
async fn rebuild_is_allowed_before_sales_and_locked_after() {
    let (engine, layout) = engine_with_layout(9).await;
    let a1 = seat_id(&layout, "A1");

    // До первой продажи схему можно перестроить целиком
    let rebuilt = engine
        .build_layout(9, &[def("Balcony", 30.0, &["D"], 4)])
        .await
        .unwrap();
    assert_eq!(rebuilt.total_seats(), 4);
    let d1 = seat_id(&rebuilt, "D1");
    assert_eq!(rebuilt.seat(d1).unwrap().price, 30.0);

    // Старая сетка заменена целиком
    let current = engine.layout(9).await.unwrap();
    assert_eq!(current.total_seats(), 4);
    assert!(current.seat(a1).is_none() || current.seat(a1).unwrap().row_label == "D");

    // После бронирования — заперта
    engine.reserve_seats(9, 1, &[d1]).await.unwrap();
    match engine.build_layout(9, &standard_defs()).await {
        Err(SeatingError::LayoutLocked { event_id }) => assert_eq!(event_id, 9),
        other => panic!("expected LayoutLocked, got {other:?}"),
    }
}

#[tokio::test]
async fn booked_price_survives_category_repricing() {
    let (engine, layout) = engine_with_layout(10).await;
    let a1 = seat_id(&layout, "A1");
    let a2 = seat_id(&layout, "A2");

    let booking = engine.reserve_seats(10, 1, &[a1, a2]).await.unwrap();
    assert_eq!(booking.total_amount, 200.0);

    // Цена категории меняется только через перестройку схемы, а перестройка
    // заперта, пока места забронированы — сумма брони не может "поехать"
    assert!(matches!(
        engine
            .build_layout(10, &[def("VIP", 500.0, &["A"], 5)])
            .await,
        Err(SeatingError::LayoutLocked { .. })
    ));
    assert_eq!(engine.booking(booking.id).await.unwrap().total_amount, 200.0);

    // После отмены перестройка с новой ценой допустима и даёт свежую сетку
    engine.cancel_booking(booking.id).await.unwrap();
    let repriced = engine
        .build_layout(10, &[def("VIP", 500.0, &["A"], 5)])
        .await
        .unwrap();
    assert!(repriced.seats.iter().all(|s| s.price == 500.0));
    // А сумма старой брони остаётся прежней
    assert_eq!(engine.booking(booking.id).await.unwrap().total_amount, 200.0);
}

#[tokio::test]
async fn blocked_seats_cannot_be_sold() {
    let (engine, layout) = engine_with_layout(11).await;
    let b1 = seat_id(&layout, "B1");
    let b2 = seat_id(&layout, "B2");

    let seat = engine.set_seat_blocked(11, b1, true).await.unwrap();
    assert_eq!(seat.status, SeatStatus::Blocked);

    match engine.reserve_seats(11, 1, &[b1, b2]).await {
        Err(SeatingError::SeatsUnavailable { seat_ids }) => assert_eq!(seat_ids, vec![b1]),
        other => panic!("expected SeatsUnavailable, got {other:?}"),
    }

    // После разблокировки место снова продаётся
    engine.set_seat_blocked(11, b1, false).await.unwrap();
    let booking = engine.reserve_seats(11, 1, &[b1, b2]).await.unwrap();
    assert_eq!(booking.seat_ids, vec![b1, b2]);
}

#[tokio::test]
async fn blocking_a_booked_seat_is_refused() {
    let (engine, layout) = engine_with_layout(12).await;
    let a1 = seat_id(&layout, "A1");

    engine.reserve_seats(12, 1, &[a1]).await.unwrap();

    match engine.set_seat_blocked(12, a1, true).await {
        Err(SeatingError::SeatOccupied { seat_id }) => assert_eq!(seat_id, a1),
        other => panic!("expected SeatOccupied, got {other:?}"),
    }

    // Место осталось за покупателем
    let layout = engine.layout(12).await.unwrap();
    assert_eq!(layout.seat(a1).unwrap().status, SeatStatus::Booked);
}

#[tokio::test]
async fn block_is_idempotent_per_state() {
    let (engine, layout) = engine_with_layout(13).await;
    let a1 = seat_id(&layout, "A1");

    engine.set_seat_blocked(13, a1, true).await.unwrap();
    let again = engine.set_seat_blocked(13, a1, true).await.unwrap();
    assert_eq!(again.status, SeatStatus::Blocked);

    let unblocked = engine.set_seat_blocked(13, a1, false).await.unwrap();
    assert_eq!(unblocked.status, SeatStatus::Available);
    let again = engine.set_seat_blocked(13, a1, false).await.unwrap();
    assert_eq!(again.status, SeatStatus::Available);
}

#[tokio::test]
async fn concurrent_block_and_reserve_have_one_winner() {
    for round in 0..20 {
        let event_id = 100 + round;
        let (engine, layout) = engine_with_layout(event_id).await;
        let a1 = seat_id(&layout, "A1");

        let buyer = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.reserve_seats(event_id, 1, &[a1]).await })
        };
        let admin = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.set_seat_blocked(event_id, a1, true).await })
        };

        let (buyer, admin) = tokio::join!(buyer, admin);
        let buyer = buyer.expect("buyer task panicked");
        let admin = admin.expect("admin task panicked");

        let layout = engine.layout(event_id).await.unwrap();
        let seat = layout.seat(a1).unwrap();
        match (buyer.is_ok(), admin.is_ok()) {
            // Покупатель успел первым — блокировка отвергнута
            (true, false) => assert_eq!(seat.status, SeatStatus::Booked),
            // Админ успел первым — бронирование отвергнуто
            (false, true) => assert_eq!(seat.status, SeatStatus::Blocked),
            other => panic!("expected exactly one winner, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn layout_projection_is_sorted_for_display() {
    let engine = Arc::new(ReservationEngine::new(MemorySeatStore::new()));
    // Ряды объявлены не по порядку
    engine
        .build_layout(
            14,
            &[
                def("General", 50.0, &["C", "B"], 2),
                def("VIP", 100.0, &["A"], 3),
            ],
        )
        .await
        .unwrap();

    let layout = engine.layout(14).await.unwrap();

    // Категории — по sort_order (порядку объявления)
    assert_eq!(layout.categories[0].name, "General");
    assert_eq!(layout.categories[1].name, "VIP");

    // Места — лексикографически по ряду, затем по номеру
    let labels: Vec<String> = layout.seats.iter().map(|s| s.label()).collect();
    assert_eq!(labels, vec!["A1", "A2", "A3", "B1", "B2", "C1", "C2"]);
}

#[tokio::test]
async fn user_bookings_are_scoped_to_the_user() {
    let (engine, layout) = engine_with_layout(15).await;
    let a1 = seat_id(&layout, "A1");
    let b1 = seat_id(&layout, "B1");

    engine.reserve_seats(15, 1, &[a1]).await.unwrap();
    engine.reserve_seats(15, 2, &[b1]).await.unwrap();

    let first = engine.user_bookings(1).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].seat_ids, vec![a1]);

    assert!(engine.user_bookings(3).await.unwrap().is_empty());
}
