//! End-to-end scenarios: models are built programmatically from input
//! trees, set up, initialized and run through the public API.

use std::sync::Arc;

use lockstep::bus::ChannelValue;
use lockstep::comp::{FmuFault, FmuSlave};
use lockstep::task::NoopRecorder;
use lockstep::{ComponentFinishState, Error, FinishState, Model, Task};

use lockstep_input::connections::{
    ConnectionInput, DecoupleKind, EndpointInput, InterExtrapolationInput,
};
use lockstep_input::model::{
    ComponentInput, ComponentKindTag, ConstantValueInput, PortInput, PortKind, SpecificDataInput,
};
use lockstep_input::task::{EndKind, StepKind, StoreLevelKind, TaskInput};
use lockstep_input::{ConfigInput, InputRoot, ModelInput, ScalarInput};

fn constant(name: &str, value: f64) -> ComponentInput {
    let mut input = ComponentInput::new(ComponentKindTag::Constant, name);
    input.outports = vec![PortInput::double("y")];
    input.specific_data = Some(SpecificDataInput::Constant {
        values: vec![ConstantValueInput::Scalar(ScalarInput::Double(value))],
    });
    input
}

fn integrator(name: &str, initial_state: f64, gain: f64) -> ComponentInput {
    let mut input = ComponentInput::new(ComponentKindTag::Integrator, name);
    input.inports = vec![PortInput::double("u")];
    input.outports = vec![PortInput::double("y")];
    input.specific_data = Some(SpecificDataInput::Integrator {
        initial_state: Some(initial_state),
        gain: Some(gain),
    });
    input
}

fn connect(from: (&str, &str), to: (&str, &str)) -> ConnectionInput {
    ConnectionInput::new(
        EndpointInput::scalar(from.0, from.1),
        EndpointInput::scalar(to.0, to.1),
    )
}

fn task(end_time: f64, delta_time: f64, step_type: StepKind) -> TaskInput {
    TaskInput {
        start_time: Some(0.0),
        end_time: Some(end_time),
        delta_time: Some(delta_time),
        step_type,
        ..Default::default()
    }
}

fn root(components: Vec<ComponentInput>, connections: Vec<ConnectionInput>, task: TaskInput) -> InputRoot {
    InputRoot {
        config: ConfigInput::default(),
        model: ModelInput {
            components,
            connections,
        },
        task,
    }
}

/// Set up, initialize and run a model; panics on any phase failure.
fn run(root: &InputRoot) -> (Model, Task, FinishState) {
    let mut task = Task::from_input(&root.task).unwrap();
    let mut model = Model::read(&root.config, &root.model, None).unwrap();
    model.setup(&task).unwrap();
    task.setup(&model).unwrap();
    model.initialize(&task).unwrap();
    let finish = task.run(&mut model, &mut NoopRecorder).unwrap();
    (model, task, finish)
}

fn out_value(model: &Model, comp: &str, channel: usize) -> f64 {
    model
        .components()
        .iter()
        .find(|c| c.name() == comp)
        .unwrap()
        .databus()
        .out_channel(channel)
        .unwrap()
        .value
        .as_double()
        .unwrap()
}

#[test_log::test]
fn constant_drives_integrator_to_one() {
    // S1: constant 1.0 into a unit-gain integrator, dt = 0.1, t_end = 1.0
    let root = root(
        vec![constant("src", 1.0), integrator("int", 0.0, 1.0)],
        vec![connect(("src", "y"), ("int", "u"))],
        task(1.0, 0.1, StepKind::Sequential),
    );

    let (model, task, finish) = run(&root);

    assert_eq!(finish, FinishState::TimeReached);
    assert_eq!(task.params().num_steps, 10);
    assert_approx_eq::assert_approx_eq!(out_value(&model, "int", 0), 1.0, 1e-9);
}

#[test_log::test]
fn decouplable_loop_is_cut_at_the_marked_connection() {
    // S2 topology: two integrators feeding each other; the backward link is
    // marked DecoupleAlways with a constant extrapolator.
    let back = connect(("b", "y"), ("a", "u"))
        .decoupled(DecoupleKind::Always, 0)
        .with_inter_extrapolation(InterExtrapolationInput::default());
    let root = root(
        vec![integrator("a", 0.0, 1.0), integrator("b", 1.0, 1.0)],
        vec![connect(("a", "y"), ("b", "u")), back],
        task(0.2, 0.1, StepKind::Sequential),
    );

    let (model, _, finish) = run(&root);
    assert_eq!(finish, FinishState::TimeReached);

    // exactly the marked connection was decoupled
    let decoupled = model.decoupled_connections();
    assert_eq!(decoupled.len(), 1);
    let info = &model.connections()[decoupled[0]].info;
    assert_eq!(info.connection_string(), "b.y -> a.u");

    // a is ordered before b once the loop is cut
    let order = model.submodel().unwrap().components();
    assert_eq!(order, &[0, 1]);

    // held-value extrapolation, stepped by hand:
    //   step 1: a += 1.0 * 0.1,   b += 0.1 * 0.1
    //   step 2: a += 1.01 * 0.1,  b += 0.201 * 0.1
    assert!((out_value(&model, "a", 0) - 0.201).abs() < 1e-12);
    assert!((out_value(&model, "b", 0) - 1.0301).abs() < 1e-12);
}

#[test]
fn undecouplable_loop_is_rejected() {
    // S3: both connections marked Never
    let root = root(
        vec![integrator("a", 0.0, 1.0), integrator("b", 0.0, 1.0)],
        vec![
            connect(("a", "y"), ("b", "u")).decoupled(DecoupleKind::Never, 0),
            connect(("b", "y"), ("a", "u")).decoupled(DecoupleKind::Never, 0),
        ],
        task(1.0, 0.1, StepKind::Sequential),
    );

    let task = Task::from_input(&root.task).unwrap();
    let mut model = Model::read(&root.config, &root.model, None).unwrap();
    let err = model.setup(&task).unwrap_err();
    assert!(matches!(err, Error::UndecouplableLoop { .. }));
    assert!(err.to_string().contains("algebraic loop cannot be decoupled"));
}

#[test]
fn decouple_priority_breaks_ties() {
    let root = root(
        vec![integrator("a", 0.0, 1.0), integrator("b", 0.0, 1.0)],
        vec![
            connect(("a", "y"), ("b", "u")).decoupled(DecoupleKind::IfNeeded, 1),
            connect(("b", "y"), ("a", "u")).decoupled(DecoupleKind::IfNeeded, 5),
        ],
        task(0.5, 0.1, StepKind::Sequential),
    );

    let (model, _, _) = run(&root);
    let decoupled = model.decoupled_connections();
    assert_eq!(decoupled.len(), 1);
    assert_eq!(
        model.connections()[decoupled[0]].info.connection_string(),
        "b.y -> a.u"
    );
}

/// FMU mock with one binary outport fanned out to binary inports.
struct BinarySource;

impl FmuSlave for BinarySource {
    fn set_input(&mut self, _index: usize, _value: &ChannelValue) -> Result<(), FmuFault> {
        Ok(())
    }

    fn get_output(&mut self, _index: usize) -> Result<ChannelValue, FmuFault> {
        Ok(ChannelValue::Binary(Arc::from(&b"frame"[..])))
    }

    fn do_step(&mut self, _time: f64, _step_size: f64) -> Result<(), FmuFault> {
        Ok(())
    }
}

struct BinarySink;

impl FmuSlave for BinarySink {
    fn set_input(&mut self, _index: usize, _value: &ChannelValue) -> Result<(), FmuFault> {
        Ok(())
    }

    fn get_output(&mut self, _index: usize) -> Result<ChannelValue, FmuFault> {
        Err(FmuFault::new("sink has no outputs"))
    }

    fn do_step(&mut self, _time: f64, _step_size: f64) -> Result<(), FmuFault> {
        Ok(())
    }
}

fn binary_source(name: &str, delta_time: Option<f64>) -> ComponentInput {
    let mut input = ComponentInput::new(ComponentKindTag::Fmu, name);
    input.outports = vec![PortInput::double("frame").with_kind(PortKind::Binary)];
    input.delta_time = delta_time;
    input
}

fn binary_sink(name: &str, delta_time: Option<f64>) -> ComponentInput {
    let mut input = ComponentInput::new(ComponentKindTag::Fmu, name);
    input.inports = vec![PortInput::double("frame").with_kind(PortKind::Binary)];
    input.delta_time = delta_time;
    input
}

fn fmu_factory(input: &ComponentInput) -> Result<Box<dyn FmuSlave>, Error> {
    if input.outports.is_empty() {
        Ok(Box::new(BinarySink))
    } else {
        Ok(Box::new(BinarySource))
    }
}

fn binary_channel_type(model: &Model, comp: &str) -> lockstep::bus::ChannelType {
    let comp = model
        .components()
        .iter()
        .find(|c| c.name() == comp)
        .unwrap();
    let db = comp.databus();
    if db.num_out_channels() > 0 {
        db.out_channel(0).unwrap().info.ty
    } else {
        db.in_channel(0).unwrap().info.ty
    }
}

#[test]
fn binary_fan_out_promotion_is_all_or_nothing() {
    use lockstep::bus::ChannelType;

    // S4: one mismatching listener keeps the whole fan-out in copying mode
    let build = |mismatched: bool| {
        let third_step = if mismatched { Some(0.1) } else { Some(0.05) };
        let root = root(
            vec![
                binary_source("src", Some(0.05)),
                binary_sink("fast", Some(0.05)),
                binary_sink("slow", third_step),
            ],
            vec![
                connect(("src", "frame"), ("fast", "frame")),
                connect(("src", "frame"), ("slow", "frame")),
            ],
            task(0.5, 0.05, StepKind::Sequential),
        );
        let task = Task::from_input(&root.task).unwrap();
        let mut model = Model::read(&root.config, &root.model, Some(&fmu_factory)).unwrap();
        model.setup(&task).unwrap();
        model
    };

    let mismatched = build(true);
    assert_eq!(binary_channel_type(&mismatched, "src"), ChannelType::Binary);
    assert_eq!(binary_channel_type(&mismatched, "fast"), ChannelType::Binary);

    let matched = build(false);
    assert_eq!(
        binary_channel_type(&matched, "src"),
        ChannelType::BinaryReference
    );
    assert_eq!(
        binary_channel_type(&matched, "slow"),
        ChannelType::BinaryReference
    );
}

#[test]
fn binary_promotion_requires_sequential_stepping() {
    use lockstep::bus::ChannelType;

    let root = root(
        vec![binary_source("src", Some(0.05)), binary_sink("snk", Some(0.05))],
        vec![connect(("src", "frame"), ("snk", "frame"))],
        task(0.5, 0.05, StepKind::ParallelSingleThread),
    );
    let task = Task::from_input(&root.task).unwrap();
    let mut model = Model::read(&root.config, &root.model, Some(&fmu_factory)).unwrap();
    model.setup(&task).unwrap();
    assert_eq!(binary_channel_type(&model, "src"), ChannelType::Binary);
}

/// FMU mock reporting `Finished` once its own end time is reached.
struct FinishingSlave {
    end_time: f64,
    time: f64,
}

impl FmuSlave for FinishingSlave {
    fn set_input(&mut self, _index: usize, _value: &ChannelValue) -> Result<(), FmuFault> {
        Ok(())
    }

    fn get_output(&mut self, _index: usize) -> Result<ChannelValue, FmuFault> {
        Ok(ChannelValue::Double(self.time))
    }

    fn do_step(&mut self, time: f64, step_size: f64) -> Result<(), FmuFault> {
        self.time = time + step_size;
        Ok(())
    }

    fn finish_state(&self) -> ComponentFinishState {
        if self.time >= self.end_time - 1e-12 {
            ComponentFinishState::Finished
        } else {
            ComponentFinishState::NotFinished
        }
    }
}

#[test]
fn run_stops_when_first_component_finishes() {
    // S5: component A finishes at t = 0.3, end type first_component
    let mut fmu = ComponentInput::new(ComponentKindTag::Fmu, "a");
    fmu.outports = vec![PortInput::double("t")];

    let mut task_input = task(1.0, 0.1, StepKind::Sequential);
    task_input.end_type = Some(EndKind::FirstComponent);

    let root = root(vec![fmu, constant("src", 1.0)], vec![], task_input);

    let factory = |_: &ComponentInput| -> Result<Box<dyn FmuSlave>, Error> {
        Ok(Box::new(FinishingSlave {
            end_time: 0.3,
            time: 0.0,
        }))
    };

    let mut task = Task::from_input(&root.task).unwrap();
    let mut model = Model::read(&root.config, &root.model, Some(&factory)).unwrap();
    model.setup(&task).unwrap();
    task.setup(&model).unwrap();
    model.initialize(&task).unwrap();
    let finish = task.run(&mut model, &mut NoopRecorder).unwrap();

    assert_eq!(finish, FinishState::Finished);
    assert!((task.params().time - 0.3).abs() < 1e-12);
}

#[test]
fn vector_connection_expands_index_by_index() {
    // S6: vector endpoints [0, 3] on both sides expand to 4 connections
    let mut src = ComponentInput::new(ComponentKindTag::Constant, "src");
    src.outports = vec![PortInput::double("v").with_dimension(4)];
    src.specific_data = Some(SpecificDataInput::Constant {
        values: vec![ConstantValueInput::Array(
            (1..=4).map(|i| ScalarInput::Double(i as f64)).collect(),
        )],
    });

    let mut sink = ComponentInput::new(ComponentKindTag::VectorIntegrator, "vint");
    sink.inports = vec![PortInput::double("du").with_dimension(4)];
    sink.outports = vec![PortInput::double("x").with_dimension(4)];

    let conn = ConnectionInput::new(
        EndpointInput::vector("src", "v", 0, 3),
        EndpointInput::vector("vint", "du", 0, 3),
    );

    let root = root(vec![src, sink], vec![conn], task(1.0, 0.1, StepKind::Sequential));
    let (model, _, _) = run(&root);

    assert_eq!(model.connections().len(), 4);
    // each state integrated its paired source element
    for i in 0..4 {
        let expected = (i + 1) as f64;
        assert!(float_cmp::approx_eq!(
            f64,
            out_value(&model, "vint", i),
            expected,
            epsilon = 1e-9
        ));
    }
}

#[test]
fn zero_connections_model_steps_independently() {
    let root = root(
        vec![constant("a", 1.0), constant("b", 2.0)],
        vec![],
        task(0.5, 0.1, StepKind::Sequential),
    );
    let (model, _, finish) = run(&root);
    assert_eq!(finish, FinishState::TimeReached);
    assert_eq!(out_value(&model, "a", 0), 1.0);
    assert_eq!(out_value(&model, "b", 0), 2.0);
}

#[test]
fn self_loop_requires_decouple_always() {
    let build = |kind: Option<DecoupleKind>| {
        let mut conn = connect(("a", "y"), ("a", "u"));
        if let Some(kind) = kind {
            conn = conn.decoupled(kind, 0);
        }
        let root = root(
            vec![integrator("a", 1.0, 1.0)],
            vec![conn],
            task(0.5, 0.1, StepKind::Sequential),
        );
        let task = Task::from_input(&root.task).unwrap();
        let mut model = Model::read(&root.config, &root.model, None).unwrap();
        model.setup(&task).map(|_| model)
    };

    assert!(matches!(
        build(None),
        Err(Error::UndecouplableLoop { .. })
    ));
    assert!(matches!(
        build(Some(DecoupleKind::IfNeeded)),
        Err(Error::UndecouplableLoop { .. })
    ));
    let model = build(Some(DecoupleKind::Always)).unwrap();
    assert_eq!(model.decoupled_connections().len(), 1);
}

#[test]
fn inverted_vector_range_is_a_structural_error() {
    let mut src = ComponentInput::new(ComponentKindTag::Constant, "src");
    src.outports = vec![PortInput::double("v").with_dimension(4)];
    let mut sink = ComponentInput::new(ComponentKindTag::VectorIntegrator, "vint");
    sink.inports = vec![PortInput::double("du").with_dimension(4)];
    sink.outports = vec![PortInput::double("x").with_dimension(4)];

    let conn = ConnectionInput::new(
        EndpointInput::vector("src", "v", 3, 0),
        EndpointInput::vector("vint", "du", 3, 0),
    );
    let root = root(vec![src, sink], vec![conn], task(1.0, 0.1, StepKind::Sequential));

    assert!(matches!(
        Model::read(&root.config, &root.model, None),
        Err(Error::InvalidVectorRange { .. })
    ));
}

#[test]
fn mandatory_unconnected_input_rejects_the_model() {
    let mut int = integrator("int", 0.0, 1.0);
    let port = int.inports[0].clone().mandatory();
    int.inports[0] = port;

    let root = root(vec![int], vec![], task(1.0, 0.1, StepKind::Sequential));
    let task = Task::from_input(&root.task).unwrap();
    let mut model = Model::read(&root.config, &root.model, None).unwrap();
    assert!(matches!(
        model.setup(&task),
        Err(Error::MandatoryNotConnected { .. })
    ));
}

#[test]
fn multiply_driven_input_rejects_the_model() {
    let root = root(
        vec![
            constant("a", 1.0),
            constant("b", 2.0),
            integrator("int", 0.0, 1.0),
        ],
        vec![
            connect(("a", "y"), ("int", "u")),
            connect(("b", "y"), ("int", "u")),
        ],
        task(1.0, 0.1, StepKind::Sequential),
    );
    let task = Task::from_input(&root.task).unwrap();
    let mut model = Model::read(&root.config, &root.model, None).unwrap();
    assert!(matches!(
        model.setup(&task),
        Err(Error::MultiplyDrivenInput { .. })
    ));
}

#[test]
fn trigger_sequences_override_decoupling_metadata() {
    // decoupling marked Never, but a trigger sequence is present: the
    // metadata is ignored (warning) and the loop decouples anyway
    let mut a = integrator("a", 0.0, 1.0);
    a.trigger_sequence = Some(0);
    let root = root(
        vec![a, integrator("b", 0.0, 1.0)],
        vec![
            connect(("a", "y"), ("b", "u")).decoupled(DecoupleKind::Never, 0),
            connect(("b", "y"), ("a", "u")).decoupled(DecoupleKind::Never, 0),
        ],
        task(0.5, 0.1, StepKind::Sequential),
    );

    let task = Task::from_input(&root.task).unwrap();
    let mut model = Model::read(&root.config, &root.model, None).unwrap();
    model.setup(&task).unwrap();
    assert!(model.decoupling_ignored());
    assert_eq!(model.decoupled_connections().len(), 1);
}

fn chain_root(step_type: StepKind) -> InputRoot {
    root(
        vec![
            constant("src", 1.0),
            integrator("first", 0.0, 1.0),
            integrator("second", 0.0, 1.0),
        ],
        vec![
            connect(("src", "y"), ("first", "u")),
            connect(("first", "y"), ("second", "u")),
        ],
        task(1.0, 0.1, step_type),
    )
}

#[rstest::rstest]
#[case::sequential(StepKind::Sequential)]
#[case::parallel_st(StepKind::ParallelSingleThread)]
#[case::parallel_mt(StepKind::ParallelMultiThread)]
fn step_disciplines_agree_on_a_chain(#[case] step_type: StepKind) {
    let (model, _, finish) = run(&chain_root(step_type));
    assert_eq!(finish, FinishState::TimeReached);

    // the chain puts each element in its own layer, so all disciplines see
    // the same data flow:
    //   first_k = k * dt,  second_k = sum_j first_j * dt
    assert_eq!(model.submodel().unwrap().layers().len(), 3);
    assert_approx_eq::assert_approx_eq!(out_value(&model, "first", 0), 1.0, 1e-9);
    assert_approx_eq::assert_approx_eq!(out_value(&model, "second", 0), 0.55, 1e-9);
}

#[test]
fn cosim_initialization_builds_a_dedicated_order() {
    // under initial dependencies the integrator does not feed through, so
    // the initialization order exists even though the runtime graph has a
    // loop that needs decoupling
    let mut root = root(
        vec![integrator("a", 0.0, 1.0), integrator("b", 1.0, 1.0)],
        vec![
            connect(("a", "y"), ("b", "u")),
            connect(("b", "y"), ("a", "u")).decoupled(DecoupleKind::Always, 0),
        ],
        task(0.2, 0.1, StepKind::Sequential),
    );
    root.config.cosim_init_enabled = true;

    let (model, _, finish) = run(&root);
    assert_eq!(finish, FinishState::TimeReached);

    let initial = model.initial_submodel().unwrap();
    assert_eq!(initial.len(), 2);
    // no initial feedthrough: both elements sit in the first layer
    assert_eq!(initial.layers().len(), 1);
}

#[test]
fn repeated_runs_are_deterministic() {
    let build = || {
        let back = connect(("b", "y"), ("a", "u")).decoupled(DecoupleKind::Always, 0);
        root(
            vec![integrator("a", 0.0, 1.0), integrator("b", 1.0, 1.0)],
            vec![connect(("a", "y"), ("b", "u")), back],
            task(1.0, 0.1, StepKind::Sequential),
        )
    };

    let (first, _, _) = run(&build());
    let (second, _, _) = run(&build());

    assert_eq!(
        first.submodel().unwrap().nodes(),
        second.submodel().unwrap().nodes()
    );
    assert_eq!(
        first.decoupled_connections(),
        second.decoupled_connections()
    );
    for comp in ["a", "b"] {
        assert_eq!(
            out_value(&first, comp, 0).to_bits(),
            out_value(&second, comp, 0).to_bits()
        );
    }
}

#[test]
fn results_are_stored_at_every_coupling_step() {
    struct CountingRecorder {
        times: Vec<f64>,
    }

    impl lockstep::Recorder for CountingRecorder {
        fn record(&mut self, _model: &Model, time: f64) -> Result<(), Error> {
            self.times.push(time);
            Ok(())
        }
    }

    let mut task_input = task(0.5, 0.1, StepKind::Sequential);
    task_input.results.store_level = Some(StoreLevelKind::Coupling);
    let root = root(
        vec![constant("src", 1.0), integrator("int", 0.0, 1.0)],
        vec![connect(("src", "y"), ("int", "u"))],
        task_input,
    );

    let mut task = Task::from_input(&root.task).unwrap();
    let mut model = Model::read(&root.config, &root.model, None).unwrap();
    model.setup(&task).unwrap();
    model.initialize(&task).unwrap();

    let mut recorder = CountingRecorder { times: Vec::new() };
    task.run(&mut model, &mut recorder).unwrap();

    // initial sample plus one per step
    assert_eq!(recorder.times.len(), 6);
    assert_eq!(recorder.times[0], 0.0);
    assert!((recorder.times[5] - 0.5).abs() < 1e-12);
}
