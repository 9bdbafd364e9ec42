//! CSV results backend: one file per component, recorded through arrow
//! array builders and written at the end of the run.

use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{
    make_builder, ArrayBuilder, BinaryBuilder, BooleanBuilder, Float64Builder, Int32Builder,
    StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use lockstep::bus::{ChannelType, ChannelValue};
use lockstep::{Error, Model, Recorder};

fn data_type_of(ty: ChannelType) -> DataType {
    match ty {
        ChannelType::Double => DataType::Float64,
        ChannelType::Integer => DataType::Int32,
        ChannelType::Bool => DataType::Boolean,
        ChannelType::String => DataType::Utf8,
        ChannelType::Binary | ChannelType::BinaryReference => DataType::Binary,
    }
}

fn storage_error(err: impl std::fmt::Display) -> Error {
    Error::Storage(err.to_string())
}

struct ComponentRecorder {
    name: String,
    schema: Arc<Schema>,
    builders: Vec<Box<dyn ArrayBuilder>>,
}

impl ComponentRecorder {
    fn append_value(builder: &mut Box<dyn ArrayBuilder>, value: &ChannelValue) {
        match value {
            ChannelValue::Double(v) => builder
                .as_any_mut()
                .downcast_mut::<Float64Builder>()
                .expect("column is not Float64")
                .append_value(*v),
            ChannelValue::Integer(v) => builder
                .as_any_mut()
                .downcast_mut::<Int32Builder>()
                .expect("column is not Int32")
                .append_value(*v),
            ChannelValue::Bool(v) => builder
                .as_any_mut()
                .downcast_mut::<BooleanBuilder>()
                .expect("column is not Boolean")
                .append_value(*v),
            ChannelValue::String(v) => builder
                .as_any_mut()
                .downcast_mut::<StringBuilder>()
                .expect("column is not Utf8")
                .append_value(v),
            ChannelValue::Binary(v) => builder
                .as_any_mut()
                .downcast_mut::<BinaryBuilder>()
                .expect("column is not Binary")
                .append_value(v),
        }
    }
}

/// Records every outport of every component and writes
/// `<output_dir>/<component>.csv` files when the run finishes.
pub struct CsvRecorder {
    output_dir: PathBuf,
    recorders: Vec<ComponentRecorder>,
}

impl CsvRecorder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            recorders: Vec::new(),
        }
    }
}

impl Recorder for CsvRecorder {
    fn start(&mut self, model: &Model) -> Result<(), Error> {
        self.recorders = model
            .components()
            .iter()
            .map(|comp| {
                let fields: Vec<Field> = std::iter::once(Field::new("time", DataType::Float64, false))
                    .chain(comp.databus().out_channels().iter().map(|channel| {
                        Field::new(&channel.info.name, data_type_of(channel.info.ty), false)
                    }))
                    .collect();
                let schema = Arc::new(Schema::new(fields));
                let builders = schema
                    .fields()
                    .iter()
                    .map(|field| make_builder(field.data_type(), 512))
                    .collect();
                ComponentRecorder {
                    name: comp.name().to_string(),
                    schema,
                    builders,
                }
            })
            .collect();
        Ok(())
    }

    fn record(&mut self, model: &Model, time: f64) -> Result<(), Error> {
        for (comp, recorder) in model.components().iter().zip(&mut self.recorders) {
            recorder.builders[0]
                .as_any_mut()
                .downcast_mut::<Float64Builder>()
                .expect("time column is not Float64")
                .append_value(time);

            for (channel, builder) in comp
                .databus()
                .out_channels()
                .iter()
                .zip(recorder.builders.iter_mut().skip(1))
            {
                ComponentRecorder::append_value(builder, &channel.value);
            }
        }
        Ok(())
    }

    fn finish(&mut self, _model: &Model) -> Result<(), Error> {
        std::fs::create_dir_all(&self.output_dir)?;

        for recorder in &mut self.recorders {
            let columns = recorder
                .builders
                .iter_mut()
                .map(|b| b.finish())
                .collect::<Vec<_>>();
            let batch = RecordBatch::try_new(Arc::clone(&recorder.schema), columns)
                .map_err(storage_error)?;

            let path = self.output_dir.join(format!("{}.csv", recorder.name));
            let file = std::fs::File::create(&path)?;
            arrow::csv::writer::WriterBuilder::new()
                .with_header(true)
                .build(file)
                .write(&batch)
                .map_err(storage_error)?;
            log::debug!("Wrote results for {} to {}", recorder.name, path.display());
        }
        Ok(())
    }
}
