//! Scoped temporary values (`set_to`) against a dummy instrument.

use daq_params::parsers::ParserKind;
use daq_params::validators::Enum;
use daq_params::{ErrorKind, Instrument, Parameter, ParameterError, ValueMapping};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Mocked instrument state shared with the device hooks.
struct Bench {
    instrument: Instrument,
    vp_value: Arc<Mutex<Value>>,
    pp_value: Arc<Mutex<Value>>,
    cp_set_count: Arc<AtomicUsize>,
    cp_get_count: Arc<AtomicUsize>,
}

impl Bench {
    fn new() -> Self {
        let mut instrument = Instrument::new("dummy_holder");

        // Pure local value holder: no hooks, the cache is the device.
        instrument.add_parameter(Parameter::builder("a")).unwrap();

        // The next two mock real instrument parameters: uncaptured at first
        // connection, so set_to has to get() before it can restore.
        let vp_value = Arc::new(Mutex::new(json!("foo")));
        let (vp_set, vp_get) = (vp_value.clone(), vp_value.clone());
        instrument
            .add_parameter(
                Parameter::builder("validated_param")
                    .validator(Enum::new(["foo", "bar"]))
                    .set_hook(move |raw| {
                        *vp_set.lock() = raw;
                        Ok(())
                    })
                    .get_hook(move || Ok(vp_get.lock().clone())),
            )
            .unwrap();

        let pp_value = Arc::new(Mutex::new(json!(42)));
        let (pp_set, pp_get) = (pp_value.clone(), pp_value.clone());
        instrument
            .add_parameter(
                Parameter::builder("parsed_param")
                    .set_parser(ParserKind::Int.parser())
                    .set_hook(move |raw| {
                        *pp_set.lock() = raw;
                        Ok(())
                    })
                    .get_hook(move || Ok(pp_get.lock().clone())),
            )
            .unwrap();

        // Counts device writes and reads; reads answer from its own cache.
        let cp_set_count = Arc::new(AtomicUsize::new(0));
        let cp_get_count = Arc::new(AtomicUsize::new(0));
        let myself: Arc<OnceLock<Weak<Parameter>>> = Arc::new(OnceLock::new());
        let (set_count, get_count, this) =
            (cp_set_count.clone(), cp_get_count.clone(), myself.clone());
        let counting = instrument
            .add_parameter(
                Parameter::builder("counting_parameter")
                    .set_hook(move |_raw| {
                        set_count.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .get_hook(move || {
                        get_count.fetch_add(1, Ordering::SeqCst);
                        let param = this
                            .get()
                            .and_then(Weak::upgrade)
                            .ok_or_else(|| anyhow::anyhow!("parameter dropped"))?;
                        Ok(param.cache().value())
                    }),
            )
            .unwrap();
        myself.set(Arc::downgrade(&counting)).unwrap();

        Self {
            instrument,
            vp_value,
            pp_value,
            cp_set_count,
            cp_get_count,
        }
    }

    fn cp_sets(&self) -> usize {
        self.cp_set_count.load(Ordering::SeqCst)
    }

    fn cp_gets(&self) -> usize {
        self.cp_get_count.load(Ordering::SeqCst)
    }
}

#[test]
fn set_to_none_when_parameter_is_not_captured_yet() {
    let bench = Bench::new();
    let counting = &bench.instrument["counting_parameter"];

    assert_eq!(bench.cp_sets(), 0);
    assert_eq!(bench.cp_gets(), 0);
    assert_eq!(counting.cache().value(), Value::Null);
    assert_eq!(counting.latest_timestamp(), None);

    {
        let _guard = counting.set_to(Value::Null).unwrap();
        // Value unchanged, but now captured by exactly one get.
        assert_eq!(counting.cache().value(), Value::Null);
        assert!(counting.latest_timestamp().is_some());
        assert_eq!(bench.cp_sets(), 0);
        assert_eq!(bench.cp_gets(), 1);
    }

    assert_eq!(counting.cache().value(), Value::Null);
    assert!(counting.latest_timestamp().is_some());
    assert_eq!(bench.cp_sets(), 0);
    assert_eq!(bench.cp_gets(), 1);
}

#[test]
fn set_to_none_for_uncaptured_parameter_with_device_value() {
    let instr_value = Arc::new(Mutex::new(json!("something")));
    let set_counter = Arc::new(AtomicUsize::new(0));
    let (sink, counter, source) = (instr_value.clone(), set_counter.clone(), instr_value.clone());

    let p = Parameter::builder("p")
        .set_hook(move |raw| {
            *sink.lock() = raw;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .get_hook(move || Ok(source.lock().clone()))
        .val_mapping(ValueMapping::new([
            (json!("foo"), json!("something")),
            (Value::Null, json!("nothing")),
        ]))
        .build()
        .unwrap();

    let before = p.cache().snapshot();
    assert_eq!(before.value, Value::Null);
    assert_eq!(before.raw_value, Value::Null);
    assert_eq!(before.timestamp, None);
    assert_eq!(set_counter.load(Ordering::SeqCst), 0);

    {
        let _guard = p.set_to(Value::Null).unwrap();
        assert_eq!(set_counter.load(Ordering::SeqCst), 1);
        assert_eq!(*instr_value.lock(), json!("nothing"));
        let inside = p.cache().snapshot();
        assert_eq!(inside.value, Value::Null);
        assert_eq!(inside.raw_value, json!("nothing"));
        assert!(inside.timestamp.is_some());
    }

    assert_eq!(set_counter.load(Ordering::SeqCst), 2);
    assert_eq!(*instr_value.lock(), json!("something"));
    let after = p.cache().snapshot();
    assert_eq!(after.value, json!("foo"));
    assert_eq!(after.raw_value, json!("something"));
    assert!(after.timestamp.is_some());
}

#[test]
fn none_value_is_restored() {
    let bench = Bench::new();
    let a = &bench.instrument["a"];

    {
        let _guard = a.set_to(3).unwrap();
        assert!(a.latest_timestamp().is_some());
        assert_eq!(a.get().unwrap(), json!(3));
    }
    assert_eq!(a.get().unwrap(), Value::Null);
    assert!(a.latest_timestamp().is_some());
}

#[test]
fn context_restores_previous_value() {
    let bench = Bench::new();
    let a = &bench.instrument["a"];
    a.set(2).unwrap();

    {
        let _guard = a.set_to(3).unwrap();
        assert_eq!(a.get().unwrap(), json!(3));
    }
    assert_eq!(a.get().unwrap(), json!(2));
}

#[test]
fn validated_param() {
    let bench = Bench::new();
    let vp = &bench.instrument["validated_param"];

    assert_eq!(vp.cache().value(), Value::Null);
    assert_eq!(vp.get().unwrap(), json!("foo"));
    assert_eq!(vp.get_latest(), json!("foo"));

    {
        let _guard = vp.set_to("bar").unwrap();
        assert_eq!(vp.get().unwrap(), json!("bar"));
        assert_eq!(*bench.vp_value.lock(), json!("bar"));
    }
    assert_eq!(vp.get_latest(), json!("foo"));
    assert_eq!(vp.get().unwrap(), json!("foo"));
}

#[test]
fn validated_param_rejects_values_outside_the_enum() {
    let bench = Bench::new();
    let vp = &bench.instrument["validated_param"];

    let err = vp.set_to("baz").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(*bench.vp_value.lock(), json!("foo"));
    assert!(vp.settable());
}

#[test]
fn parsed_param() {
    let bench = Bench::new();
    let pp = &bench.instrument["parsed_param"];

    assert_eq!(pp.cache().value(), Value::Null);
    assert_eq!(pp.cached_or_get().unwrap(), json!(42));

    {
        let _guard = pp.set_to(1).unwrap();
        assert_eq!(pp.get().unwrap(), json!(1));
    }
    assert_eq!(pp.get_latest(), json!(42));
    assert_eq!(pp.get().unwrap(), json!(42));
}

#[test]
fn parsed_param_stores_parsed_integer_as_raw_value() {
    let bench = Bench::new();
    let pp = &bench.instrument["parsed_param"];

    {
        let _guard = pp.set_to("7").unwrap();
        assert_eq!(*bench.pp_value.lock(), json!(7));
        assert_eq!(pp.cache().raw_value(), json!(7));
    }
    assert_eq!(*bench.pp_value.lock(), json!(42));
}

#[test]
fn number_of_set_calls() {
    let bench = Bench::new();
    let counting = &bench.instrument["counting_parameter"];

    assert_eq!(bench.cp_sets(), 0);
    counting.set(1).unwrap();
    assert_eq!(bench.cp_sets(), 1);

    {
        let _guard = counting.set_to(2).unwrap();
    }
    assert_eq!(bench.cp_sets(), 3);

    // Already at 1: neither entry nor exit needs a write.
    {
        let _guard = counting.set_to(1).unwrap();
    }
    assert_eq!(bench.cp_sets(), 3);
}

#[test]
fn freeze() {
    let bench = Bench::new();
    let a = &bench.instrument["a"];
    a.set(2).unwrap();

    {
        let _guard = a.set_to_frozen(3).unwrap();
        assert_eq!(a.get().unwrap(), json!(3));
        assert!(!a.settable());
        let err = a.set(5).unwrap_err();
        assert!(matches!(err, ParameterError::NotSettable { .. }));
        assert_eq!(err.kind(), ErrorKind::Capability);
    }

    assert!(a.settable());
    assert_eq!(a.get().unwrap(), json!(2));
}

#[test]
fn no_freeze() {
    let bench = Bench::new();
    let a = &bench.instrument["a"];
    a.set(2).unwrap();

    {
        let _guard = a.set_to(3).unwrap();
        assert!(a.settable());
        assert_eq!(a.get().unwrap(), json!(3));
        a.set(5).unwrap();
        assert_eq!(a.get().unwrap(), json!(5));
    }

    assert!(a.settable());
    assert_eq!(a.get().unwrap(), json!(2));
}

#[test]
fn context_initialized_with_current_value() {
    let bench = Bench::new();
    let a = &bench.instrument["a"];
    a.set(2).unwrap();

    {
        let _guard = a.set_to(2).unwrap();
        assert_eq!(a.get().unwrap(), json!(2));
        a.set(3).unwrap();
        assert_eq!(a.get().unwrap(), json!(3));
    }

    assert_eq!(a.get().unwrap(), json!(2));
}

#[test]
fn guard_derefs_to_parameter() {
    let bench = Bench::new();
    let guard = bench.instrument["a"].set_to(8).unwrap();
    assert_eq!(guard.get().unwrap(), json!(8));
    assert_eq!(guard.full_name(), "dummy_holder_a");
    guard.exit().unwrap();
    assert_eq!(bench.instrument["a"].get_latest(), Value::Null);
}
