//! Scoring example for the dagrun executor
//!
//! Two leaf tasks produce numbers, a third adds them and the root formats a
//! score from the sum and one of the leaves. Every task simulates one second
//! of work; since the leaves run concurrently and the shared leaf runs once,
//! the whole graph finishes in about three seconds.

use std::fmt;
use std::time::{Duration, Instant};

use dagrun::{
    async_trait, BoxError, Dependency, DependencyGraph, ExecutionContext, Executor,
    SimpleConsoleReporter, TaskKey, TaskSpec,
};
use tracing_subscriber::EnvFilter;

const WORK: Duration = Duration::from_secs(1);

/// Values flowing through the context
#[derive(Clone, Debug, PartialEq)]
enum Value {
    Number(i64),
    Text(String),
}

impl Value {
    fn number(&self) -> Result<i64, BoxError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Text(text) => Err(format!("expected a number, found {text:?}").into()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Default)]
struct Base;

#[derive(Debug, Default)]
struct Bonus;

#[derive(Debug, Default)]
struct Subtotal;

#[derive(Debug, Default)]
struct Score;

#[async_trait]
impl TaskSpec for Base {
    type Output = Value;

    fn key(&self) -> TaskKey {
        "base".into()
    }

    async fn compute(&self, _context: &ExecutionContext<Value>) -> Result<Value, BoxError> {
        tokio::time::sleep(WORK).await;
        Ok(Value::Number(23))
    }
}

#[async_trait]
impl TaskSpec for Bonus {
    type Output = Value;

    fn key(&self) -> TaskKey {
        "bonus".into()
    }

    async fn compute(&self, _context: &ExecutionContext<Value>) -> Result<Value, BoxError> {
        tokio::time::sleep(WORK).await;
        Ok(Value::Number(3))
    }
}

#[async_trait]
impl TaskSpec for Subtotal {
    type Output = Value;

    fn key(&self) -> TaskKey {
        "subtotal".into()
    }

    fn dependencies(&self) -> Vec<Dependency<Value>> {
        vec![Dependency::of::<Base>("base"), Dependency::of::<Bonus>("bonus")]
    }

    async fn compute(&self, context: &ExecutionContext<Value>) -> Result<Value, BoxError> {
        tokio::time::sleep(WORK).await;
        let base = context.get("base")?.number()?;
        let bonus = context.get("bonus")?.number()?;
        Ok(Value::Number(base + bonus))
    }
}

#[async_trait]
impl TaskSpec for Score {
    type Output = Value;

    fn key(&self) -> TaskKey {
        "score".into()
    }

    fn dependencies(&self) -> Vec<Dependency<Value>> {
        vec![
            Dependency::of::<Bonus>("bonus"),
            Dependency::of::<Subtotal>("subtotal"),
        ]
    }

    async fn compute(&self, context: &ExecutionContext<Value>) -> Result<Value, BoxError> {
        tokio::time::sleep(WORK).await;
        let subtotal = context.get("subtotal")?.number()?;
        let bonus = context.get("bonus")?.number()?;
        Ok(Value::Text(format!("score: {}", subtotal + bonus)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let start_time = Instant::now();

    let graph = DependencyGraph::build(Dependency::of::<Score>("score"))?;
    let executor = Executor::new().with_reporter(SimpleConsoleReporter::with_prefix("score"));
    let result = executor.run(&graph, &ExecutionContext::new()).await?;

    println!("{result}");
    println!("Time taken: {:.0} seconds", start_time.elapsed().as_secs_f64());
    Ok(())
}
