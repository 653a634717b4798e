// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;
use std::rc::Rc;

use rgtb_engine::events::once::Once;
use rgtb_engine::run_simulation;
use rgtb_engine::test_helpers::start_test;
use rgtb_engine::traits::Event;

#[test]
fn notify_zero_listeners() {
    let mut engine = start_test(file!());

    let event = Once::new(1);

    engine.spawn(async move {
        event.notify()?;
        Ok(())
    });

    run_simulation!(engine);
    assert_eq!(engine.time_now_ns(), 0.0);
}

#[test]
fn notify_one_listener() {
    let mut engine = start_test(file!());
    let timer = engine.timer();

    let once = Once::new(123);

    {
        let once = once.clone();
        let timer = timer.clone();
        engine.spawn(async move {
            let res = once.listen().await;
            assert_eq!(res, 123);

            // Ensure this hasn't completed early
            assert_eq!(timer.now_ns(), 10.0);
            Ok(())
        });
    }

    engine.spawn(async move {
        timer.wait_ns(10).await;
        once.notify()?;
        Ok(())
    });

    run_simulation!(engine);
    assert_eq!(engine.time_now_ns(), 10.0);
}

#[test]
fn notify_before_listener() {
    let mut engine = start_test(file!());
    let timer = engine.timer();

    let once = Once::new(0);

    {
        let once = once.clone();
        engine.spawn(async move {
            timer.wait_ns(10).await;
            let res = once.listen().await;
            assert_eq!(res, 1234);
            Ok(())
        });
    }

    engine.spawn(async move {
        once.notify_result(1234)?;
        Ok(())
    });

    run_simulation!(engine);
    assert_eq!(engine.time_now_ns(), 10.0);
}

#[test]
fn notify_multiple_listeners() {
    let mut engine = start_test(file!());
    let timer = engine.timer();

    let once = Once::new("ok");
    let count = Rc::new(RefCell::new(0));
    let num_listen = 10;

    for _ in 0..num_listen {
        let once = once.clone();
        let count = count.clone();
        engine.spawn(async move {
            let res = once.listen().await;
            assert_eq!(res, "ok");
            *count.borrow_mut() += 1;
            Ok(())
        });
    }

    {
        let count = count.clone();
        engine.spawn(async move {
            timer.wait_ns(10).await;
            assert_eq!(*count.borrow(), 0);
            once.notify()?;
            Ok(())
        });
    }

    run_simulation!(engine);
    assert_eq!(*count.borrow(), num_listen);
}

#[test]
fn notify_twice() {
    let mut engine = start_test(file!());

    let once = Once::new("don't care");

    engine.spawn(async move {
        once.notify()?;
        once.notify()?;
        Ok(())
    });

    run_simulation!(engine, "Error: once event already triggered");
}
