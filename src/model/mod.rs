//! Model lifecycle: reading, setup phases, and the initialization protocol.

mod graph;

pub use graph::{write_component_graph, write_model_graph};

use std::collections::HashMap;
use std::path::Path;

use lockstep_input::model::ModelInput;
use lockstep_input::task::StepKind;
use lockstep_input::ConfigInput;

use crate::bus::{ChannelMode, ChannelType};
use crate::comp::{create_component, Component, FmuFactory};
use crate::conn::{resolve, ConnId, Connection, ConnectionInfo, Connections, FilterMode};
use crate::sched::{self, DependencyKind, SubModel};
use crate::step::StepParts;
use crate::task::Task;
use crate::{Error, Outcome, Status, TimeInterval};

/// Engine-level settings consumed by the model.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelConfig {
    pub cosim_init_enabled: bool,
    pub write_graphs: bool,
}

impl From<&ConfigInput> for ModelConfig {
    fn from(input: &ConfigInput) -> Self {
        Self {
            cosim_init_enabled: input.cosim_init_enabled,
            write_graphs: input.write_graphs,
        }
    }
}

/// Owner of all components, connections and computed evaluation orders.
#[derive(Debug)]
pub struct Model {
    config: ModelConfig,
    components: Vec<Component>,
    /// Connection metadata between read and materialization.
    infos: Vec<ConnectionInfo>,
    connections: Connections,
    submodel: Option<SubModel>,
    initial_submodel: Option<SubModel>,
    decoupling_ignored: bool,
}

impl Model {
    /// Materialize components and connection metadata from the parsed input
    /// tree. FMU components need a registered factory.
    pub fn read(
        config: &ConfigInput,
        input: &ModelInput,
        fmu_factory: Option<&FmuFactory>,
    ) -> Result<Model, Error> {
        let mut model = Model {
            config: config.into(),
            components: Vec::new(),
            infos: Vec::new(),
            connections: Connections::default(),
            submodel: None,
            initial_submodel: None,
            decoupling_ignored: false,
        };

        log::info!("Reading model elements");
        for (id, comp_input) in input.components.iter().enumerate() {
            log::debug!("  Element: \"{}\"", comp_input.name);
            let comp = create_component(comp_input, id, fmu_factory)?;
            model.components.push(comp);
        }
        log::info!("Read {} elements", model.components.len());

        if input.connections.is_empty() {
            log::warn!("No connections specified");
        } else {
            log::info!("Reading model connections");
            for conn_input in &input.connections {
                let infos = resolve::expand_connection(&model.components, conn_input)?;
                for info in &infos {
                    log::debug!("  Connection: {}", info.connection_string());
                }
                model.infos.extend(infos);
            }
            log::info!("Read {} connections", model.infos.len());
        }

        Ok(model)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    pub fn submodel(&self) -> Option<&SubModel> {
        self.submodel.as_ref()
    }

    pub fn initial_submodel(&self) -> Option<&SubModel> {
        self.initial_submodel.as_ref()
    }

    pub fn decoupling_ignored(&self) -> bool {
        self.decoupling_ignored
    }

    /// The connection ids whose `decoupled` flag the solver has set.
    pub fn decoupled_connections(&self) -> Vec<ConnId> {
        self.connections
            .iter()
            .enumerate()
            .filter(|(_, c)| c.info.decoupled)
            .map(|(id, _)| id)
            .collect()
    }

    /// Disjoint borrows for a step discipline; available after setup.
    pub fn step_parts(&mut self) -> Result<StepParts<'_>, Error> {
        let submodel = self
            .submodel
            .as_ref()
            .ok_or_else(|| Error::InvalidTask("model not set up".into()))?;
        Ok(StepParts {
            submodel,
            components: &mut self.components,
            connections: &mut self.connections,
        })
    }

    /// Run all setup phases, in order: binary-channel preprocessing,
    /// connectivity check, component setup, databus setup, connection
    /// materialization, evaluation-order computation with loop decoupling,
    /// filter insertion, consistency checks, optional graph output.
    pub fn setup(&mut self, task: &Task) -> Outcome {
        let mut status = Status::Ok;

        status = status.merge(self.preprocess_binary_connections(task)?);

        log::debug!("Checking model connections");
        resolve::check_connectivity(&self.components, &self.infos)?;

        log::info!("Setting up model elements");
        for comp in &mut self.components {
            log::debug!("  Element: \"{}\"", comp.name());
            status = status.merge(comp.setup().map_err(|e| {
                log::error!("Setup of element {} failed", comp.name());
                e
            })?);
        }

        log::info!("Setting up data bus of model elements");
        for comp in &mut self.components {
            status = status.merge(comp.setup_databus()?);
        }

        log::info!("Setting up model connections");
        self.make_connections(task.step_kind())?;

        log::info!("Calculating model elements evaluation order:");
        status = status.merge(self.connections_done()?);

        log::debug!("Setting up model connection filters:");
        self.insert_all_filters()?;

        log::debug!("Process model consistency checks");
        self.consistency_checks()?;

        if self.config.write_graphs {
            if let Err(err) = self.write_graphs(Path::new(".")) {
                // do not abort the run just because graphs could not be
                // exported
                log::warn!("Could not export model graphs: {err}");
                status = status.merge(Status::Warning);
            }
        }

        Ok(status)
    }

    /// For the sequential step discipline, promote binary channels to
    /// zero-copy references where the whole fan-out of a source channel
    /// shares the task time step. All-or-nothing per source channel: one
    /// mismatching target keeps the whole fan-out in copying mode.
    fn preprocess_binary_connections(&mut self, task: &Task) -> Outcome {
        if task.step_kind() != StepKind::Sequential {
            return Ok(Status::Ok);
        }

        let components = &self.components;
        let is_binary = |info: &ConnectionInfo| {
            let src = &components[info.source]
                .databus()
                .out_channel(info.source_channel)
                .expect("resolved source channel")
                .info;
            let trg = &components[info.target]
                .databus()
                .in_channel(info.target_channel)
                .expect("resolved target channel")
                .info;
            src.ty.is_binary() && trg.ty.is_binary()
        };

        let binary_infos: Vec<usize> = (0..self.infos.len())
            .filter(|&i| is_binary(&self.infos[i]))
            .collect();

        let matches_task_step = |comp: &Component| {
            !comp.has_own_time() || comp.time_step() == Some(task.time_step())
        };

        let mut processed = vec![false; self.infos.len()];
        for &idx in &binary_infos {
            if processed[idx] {
                continue;
            }

            let source = (self.infos[idx].source, self.infos[idx].source_channel);
            let fan_out: Vec<usize> = binary_infos
                .iter()
                .copied()
                .filter(|&i| (self.infos[i].source, self.infos[i].source_channel) == source)
                .collect();

            let can_make_references = fan_out.iter().all(|&i| {
                let info = &self.infos[i];
                matches_task_step(&self.components[info.source])
                    && matches_task_step(&self.components[info.target])
            });

            let ty = if can_make_references {
                ChannelType::BinaryReference
            } else {
                ChannelType::Binary
            };

            for &i in &fan_out {
                processed[i] = true;
                let info = &self.infos[i];
                if can_make_references {
                    log::debug!(
                        "Fast binary channel requirements fulfilled for connection {}",
                        info.connection_string()
                    );
                } else {
                    log::debug!(
                        "Using binary channels for connection {}",
                        info.connection_string()
                    );
                }

                let (source, source_channel) = (info.source, info.source_channel);
                let (target, target_channel) = (info.target, info.target_channel);
                self.components[source]
                    .databus_mut()
                    .out_channel_mut(source_channel)
                    .expect("resolved source channel")
                    .info
                    .ty = ty;
                self.components[target]
                    .databus_mut()
                    .in_channel_mut(target_channel)
                    .expect("resolved target channel")
                    .info
                    .ty = ty;
            }
        }

        Ok(Status::Ok)
    }

    /// Turn connection metadata into live connections attached to their
    /// source and target channels. The filter flavor follows the step
    /// discipline: interpolating under sequential stepping, extrapolating
    /// otherwise.
    fn make_connections(&mut self, step_kind: StepKind) -> Outcome {
        let filter_mode = if step_kind == StepKind::Sequential {
            FilterMode::Interpolating
        } else {
            FilterMode::Extrapolating
        };

        for info in std::mem::take(&mut self.infos) {
            let channel_type = self.components[info.source]
                .databus()
                .out_channel(info.source_channel)
                .expect("resolved source channel")
                .info
                .ty;

            let (source, source_channel) = (info.source, info.source_channel);
            let (target, target_channel) = (info.target, info.target_channel);

            let target_channel_ref = self.components[target]
                .databus()
                .in_channel(target_channel)
                .expect("resolved target channel");
            if target_channel_ref.is_connected() {
                return Err(Error::MultiplyDrivenInput {
                    component: self.components[target].name().to_string(),
                    channel: target_channel_ref.info.name.clone(),
                });
            }

            let id = self
                .connections
                .push(Connection::new(info, channel_type, filter_mode));

            self.components[source]
                .databus_mut()
                .out_channel_mut(source_channel)
                .expect("resolved source channel")
                .connections
                .push(id);
            self.components[target]
                .databus_mut()
                .in_channel_mut(target_channel)
                .expect("resolved target channel")
                .connection = Some(id);
        }

        log::debug!("Creating connections done");
        Ok(Status::Ok)
    }

    /// Compute the evaluation orders: the initialization order first (no
    /// decoupling allowed there), then the runtime order with the
    /// decoupling loop.
    fn connections_done(&mut self) -> Outcome {
        if self.submodel.is_some() {
            return Ok(Status::Ok);
        }

        let mut status = Status::Ok;

        let has_decouple_infos = self
            .connections
            .iter()
            .any(|c| c.info.has_decouple_settings());
        let has_trigger_sequence = self
            .components
            .iter()
            .any(|c| c.sequence_number().is_some_and(|n| n >= 0));
        if has_decouple_infos && has_trigger_sequence {
            log::warn!(
                "Both Decoupling Information and Trigger Sequences are present: \
                 ignoring Decoupling Information"
            );
            self.decoupling_ignored = true;
            status = status.merge(Status::Warning);
        }

        if self.config.cosim_init_enabled {
            log::info!("Initialization evaluation order from model input file (element, group):");
            let (initial, s) = sched::build_submodel(
                &self.components,
                &mut self.connections,
                DependencyKind::Initial,
                false,
                self.decoupling_ignored,
            )?;
            status = status.merge(s);
            self.initial_submodel = Some(initial);
        }

        log::info!("Runtime evaluation order from model input file (element, group):");
        let (submodel, s) = sched::build_submodel(
            &self.components,
            &mut self.connections,
            DependencyKind::Runtime,
            true,
            self.decoupling_ignored,
        )?;
        status = status.merge(s);
        self.submodel = Some(submodel);

        Ok(status)
    }

    fn insert_all_filters(&mut self) -> Outcome {
        for connection in self.connections.iter_mut() {
            if connection.info.needs_filter() && !connection.has_filter() {
                log::debug!(
                    "  Adding filter to connection: {}",
                    connection.info.connection_string()
                );
                connection.add_filter()?;
            }
        }
        Ok(Status::Ok)
    }

    fn consistency_checks(&self) -> Outcome {
        let mut names: HashMap<&str, usize> = HashMap::new();
        for comp in &self.components {
            if let Some(&first) = names.get(comp.name()) {
                return Err(Error::DuplicateComponentName {
                    name: comp.name().to_string(),
                    first,
                    second: comp.id(),
                });
            }
            names.insert(comp.name(), comp.id());
        }

        for comp in &self.components {
            let db = comp.databus();
            for (i, channel) in db.in_channels().iter().enumerate() {
                if channel.info.mode == ChannelMode::Mandatory && !channel.is_connected() {
                    return Err(Error::MandatoryNotConnected {
                        component: comp.name().to_string(),
                        channel: channel.info.name.clone(),
                        index: i + 1,
                        direction: "inport",
                    });
                }
            }
            for (i, channel) in db.out_channels().iter().enumerate() {
                if channel.info.mode == ChannelMode::Mandatory && !channel.is_connected() {
                    return Err(Error::MandatoryNotConnected {
                        component: comp.name().to_string(),
                        channel: channel.info.name.clone(),
                        index: i + 1,
                        direction: "outport",
                    });
                }
            }
        }

        Ok(Status::Ok)
    }

    /// Diagnostic DOT export: one file for the whole model, one per
    /// component, plus an `_initial` variant where the initial feedthrough
    /// differs from the runtime one.
    pub fn write_graphs(&self, dir: &Path) -> std::io::Result<()> {
        write_model_graph(&self.components, &self.connections, &dir.join("model.dot"))?;

        for comp in &self.components {
            write_component_graph(
                comp,
                DependencyKind::Runtime,
                &dir.join(format!("{}.dot", comp.name())),
            )?;
            if comp.dependencies(DependencyKind::Initial)
                != comp.dependencies(DependencyKind::Runtime)
            {
                write_component_graph(
                    comp,
                    DependencyKind::Initial,
                    &dir.join(format!("{}_initial.dot", comp.name())),
                )?;
            }
        }
        Ok(())
    }

    /// The four-phase initialization protocol: enter init mode, initialize
    /// on the runtime order, iterate initial outputs on the initialization
    /// order, exit init mode, and publish outputs once more so the first
    /// `DoStep` sees consistent inputs.
    pub fn initialize(&mut self, task: &Task) -> Outcome {
        let start_time = task.time_start();
        let at_end = task.input_at_end_time();
        let instant = TimeInterval::instant(start_time);
        let mut status = Status::Ok;

        let submodel = self
            .submodel
            .clone()
            .ok_or_else(|| Error::InvalidTask("model not set up".into()))?;
        let init_list = if self.config.cosim_init_enabled {
            self.initial_submodel
                .clone()
                .ok_or_else(|| Error::InvalidTask("initialization order missing".into()))?
        } else {
            submodel.clone()
        };

        // enter initialization mode
        for comp in &mut self.components {
            status = status.merge(comp.enter_initialization_mode()?);
        }
        for connection in self.connections.iter_mut() {
            connection.enter_init_mode();
        }

        // seed decoupled connections with the current output values so
        // targets inside cut loops see defined inputs
        for comp in &self.components {
            for channel in comp.databus().out_channels() {
                for &id in &channel.connections {
                    let connection = &mut self.connections[id];
                    if connection.info.decoupled {
                        connection.store(&channel.value, start_time);
                    }
                }
            }
        }

        // initialize each element on the runtime order
        for &comp_id in submodel.components() {
            let comp = &mut self.components[comp_id];
            comp.databus_mut()
                .trigger_in_connections(&self.connections, &instant, at_end)?;
            status = status.merge(comp.initialize(start_time).map_err(|e| {
                log::error!("Element initialize failed");
                e
            })?);
            status = status.merge(comp.write_outputs()?);
            comp.databus()
                .update_out_connections(&mut self.connections, start_time)?;
        }

        // iterate initial outputs on the initialization evaluation list
        let cosim_init = self.config.cosim_init_enabled;
        for node in init_list.nodes() {
            let comp = &mut self.components[node.comp];
            comp.databus_mut()
                .trigger_in_connections(&self.connections, &instant, at_end)?;
            if cosim_init {
                status = status.merge(comp.update_in_channels()?);
                status = status.merge(comp.update_initial_out_channels()?);
            }
            status = status.merge(comp.write_outputs()?);
            comp.databus()
                .update_out_connections(&mut self.connections, start_time)?;
        }

        // exit initialization mode
        for &comp_id in submodel.components() {
            status = status.merge(self.components[comp_id].exit_initialization_mode()?);
        }
        for connection in self.connections.iter_mut() {
            connection.exit_init_mode(start_time);
        }

        // publish outputs once more for the first step
        for node in submodel.nodes() {
            let comp = &mut self.components[node.comp];
            status = status.merge(comp.write_outputs()?);
            comp.databus()
                .update_out_connections(&mut self.connections, start_time)?;
        }

        Ok(status)
    }
}
