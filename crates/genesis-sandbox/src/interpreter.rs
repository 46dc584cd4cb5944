//! Tree-walking interpreter: executes a parsed [`TraitDef`] against an
//! [`EntityView`], and wraps that execution as a
//! [`genesis_world::registry::Trait`] implementation installable straight
//! into the registry.

use crate::ast::{AssignOp, AssignTarget, BinOp, Builtin, Expr, Method, Stmt, TraitDef, UnOp};
use genesis_rng::RngStream;
use genesis_world::{EntityView, Trait, TraitFault};
use std::collections::HashMap;
use std::sync::Mutex;

/// Runtime failure raised while walking a trait body. Always reported to
/// the executor as [`TraitFault::Error`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// A `Var` reference to a name with no binding in scope.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    /// A builtin received the wrong number of arguments.
    #[error("{0} expects {1} argument(s)")]
    WrongArity(&'static str, usize),
    /// The trait's own RNG mutex was poisoned by a prior panicking
    /// invocation; this invocation cannot draw randomness.
    #[error("trait rng unavailable: mutex poisoned by a prior panic")]
    RngPoisoned,
}

/// One compiled trait: its parsed body plus its own dedicated RNG stream,
/// so `rand()` calls are reproducible given the same global seed and
/// stream id.
pub struct DslTrait {
    def: TraitDef,
    rng: Mutex<RngStream>,
}

impl DslTrait {
    /// Wrap a parsed definition with the RNG stream it should draw from.
    pub fn new(def: TraitDef, rng: RngStream) -> Self {
        DslTrait { def, rng: Mutex::new(rng) }
    }

    /// The trait's registry name.
    pub fn name(&self) -> &str {
        &self.def.name
    }
}

struct Scope<'a> {
    consts: HashMap<String, f64>,
    locals: Vec<HashMap<String, f64>>,
    view: &'a mut EntityView,
    rng: &'a Mutex<RngStream>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, name: &str) -> Option<f64> {
        for frame in self.locals.iter().rev() {
            if let Some(v) = frame.get(name) {
                return Some(*v);
            }
        }
        self.consts.get(name).copied()
    }
}

fn eval(expr: &Expr, scope: &mut Scope<'_>) -> Result<f64, RuntimeError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Var(name) => scope.lookup(name).ok_or_else(|| RuntimeError::UndefinedVariable(name.clone())),
        Expr::EntityField(field) => Ok(read_field(scope.view, field)),
        Expr::Unary(UnOp::Neg, inner) => Ok(-eval(inner, scope)?),
        Expr::Binary(op, lhs, rhs) => {
            let a = eval(lhs, scope)?;
            let b = eval(rhs, scope)?;
            Ok(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => if b == 0.0 { 0.0 } else { a / b },
                BinOp::Lt => bool_to_f64(a < b),
                BinOp::Le => bool_to_f64(a <= b),
                BinOp::Gt => bool_to_f64(a > b),
                BinOp::Ge => bool_to_f64(a >= b),
                BinOp::Eq => bool_to_f64(a == b),
                BinOp::NotEq => bool_to_f64(a != b),
            })
        }
        Expr::BuiltinCall(builtin, args) => eval_builtin(*builtin, args, scope),
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn read_field(view: &EntityView, field: &str) -> f64 {
    match field {
        "x" => f64::from(view.x),
        "y" => f64::from(view.y),
        "energy" => f64::from(view.energy),
        "max_energy" => f64::from(view.max_energy),
        "age" => view.age as f64,
        "generation" => f64::from(view.generation),
        "metabolism_rate" => f64::from(view.metabolism_rate),
        "energy_consumption_rate" => f64::from(view.energy_consumption_rate),
        // unreachable once the validator/parser have both run: every
        // EntityField node is constructed from a fixed whitelist
        _ => 0.0,
    }
}

fn eval_builtin(builtin: Builtin, args: &[Expr], scope: &mut Scope<'_>) -> Result<f64, RuntimeError> {
    let evaluated: Result<Vec<f64>, RuntimeError> = args.iter().map(|a| eval(a, scope)).collect();
    let values = evaluated?;
    match builtin {
        Builtin::Abs => arity(&values, 1, "abs").map(|v| v[0].abs()),
        Builtin::Min => arity(&values, 2, "min").map(|v| v[0].min(v[1])),
        Builtin::Max => arity(&values, 2, "max").map(|v| v[0].max(v[1])),
        Builtin::Clamp => arity(&values, 3, "clamp").map(|v| v[0].clamp(v[1].min(v[2]), v[2].max(v[1]))),
        Builtin::Rand => {
            arity(&values, 0, "rand")?;
            let mut rng = scope.rng.lock().map_err(|_| RuntimeError::RngPoisoned)?;
            Ok(rng.next_f64())
        }
        Builtin::Distance => arity(&values, 4, "distance").map(|v| {
            let dx = v[0] - v[2];
            let dy = v[1] - v[3];
            (dx * dx + dy * dy).sqrt()
        }),
        Builtin::NearestResourceDistance => {
            arity(&values, 0, "nearest_resource_distance")?;
            Ok(nearest_resource_distance(scope.view))
        }
        Builtin::NearestEntityDistance => {
            arity(&values, 0, "nearest_entity_distance")?;
            Ok(nearest_entity_distance(scope.view))
        }
    }
}

fn arity(values: &[f64], expected: usize, name: &'static str) -> Result<&[f64], RuntimeError> {
    if values.len() == expected {
        Ok(values)
    } else {
        Err(RuntimeError::WrongArity(name, expected))
    }
}

fn nearest_resource_distance(view: &EntityView) -> f64 {
    view.nearby_resources
        .iter()
        .map(|r| {
            let dx = f64::from(r.x) - f64::from(view.x);
            let dy = f64::from(r.y) - f64::from(view.y);
            (dx * dx + dy * dy).sqrt()
        })
        .fold(f64::MAX, f64::min)
}

fn nearest_entity_distance(view: &EntityView) -> f64 {
    view.nearby_entities
        .iter()
        .map(|e| {
            let dx = f64::from(e.x) - f64::from(view.x);
            let dy = f64::from(e.y) - f64::from(view.y);
            (dx * dx + dy * dy).sqrt()
        })
        .fold(f64::MAX, f64::min)
}

fn exec_stmt(stmt: &Stmt, scope: &mut Scope<'_>) -> Result<(), RuntimeError> {
    match stmt {
        Stmt::Assign { target, op, value } => {
            let rhs = eval(value, scope)?;
            let current = match target {
                AssignTarget::Energy => f64::from(scope.view.energy),
                AssignTarget::EnergyConsumptionRate => f64::from(scope.view.energy_consumption_rate),
            };
            let next = match op {
                AssignOp::Set => rhs,
                AssignOp::AddAssign => current + rhs,
                AssignOp::SubAssign => current - rhs,
                AssignOp::MulAssign => current * rhs,
            };
            match target {
                AssignTarget::Energy => scope.view.energy = next.max(0.0) as f32,
                AssignTarget::EnergyConsumptionRate => scope.view.energy_consumption_rate = next.max(0.0) as f32,
            }
            Ok(())
        }
        Stmt::Call(Method::Move(dx, dy)) => {
            let dx = eval(dx, scope)? as f32;
            let dy = eval(dy, scope)? as f32;
            scope.view.move_by(dx, dy);
            Ok(())
        }
        Stmt::Call(Method::ConsumeResource(radius)) => {
            let radius = eval(radius, scope)? as f32;
            scope.view.consume_resource(radius);
            Ok(())
        }
        Stmt::If { cond, then_branch, else_branch } => {
            if eval(cond, scope)? != 0.0 {
                exec_block(then_branch, scope)
            } else {
                exec_block(else_branch, scope)
            }
        }
        Stmt::For { var, upper, body } => {
            for i in 0..*upper {
                scope.locals.push(HashMap::from([(var.clone(), f64::from(i))]));
                let result = exec_block(body, scope);
                scope.locals.pop();
                result?;
            }
            Ok(())
        }
    }
}

fn exec_block(stmts: &[Stmt], scope: &mut Scope<'_>) -> Result<(), RuntimeError> {
    for stmt in stmts {
        exec_stmt(stmt, scope)?;
    }
    Ok(())
}

impl Trait for DslTrait {
    fn execute(&self, view: &mut EntityView) -> Result<(), TraitFault> {
        let consts: HashMap<String, f64> = self.def.consts.iter().map(|c| (c.name.clone(), c.value)).collect();
        let mut scope = Scope { consts, locals: Vec::new(), view, rng: &self.rng };
        exec_block(&self.def.body, &mut scope).map_err(|e| TraitFault::Error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;
    use genesis_rng::GlobalSeed;
    use genesis_world::{Entity, EntityId};

    fn compile(src: &str) -> DslTrait {
        let tokens = lex(src).expect("lex");
        let def = parse(&tokens).expect("parse");
        let mut seed = GlobalSeed::from_genesis(1);
        let rng = seed.stream(genesis_rng::RngSubsystem::TraitDsl, 0).clone();
        DslTrait::new(def, rng)
    }

    fn sample_view() -> EntityView {
        let entity = Entity::spawn(EntityId(1), 0.0, 0.0, 50.0, 100.0, 0, 0, None, 0, 1.0, 0.5, vec![]);
        EntityView::from_entity(&entity, vec![], vec![])
    }

    #[test]
    fn move_statement_updates_position() {
        let t = compile("trait go { fn execute(entity) { entity.move(2.0, 3.0); } }");
        let mut view = sample_view();
        t.execute(&mut view).expect("execute");
        assert_eq!(view.x, 2.0);
        assert_eq!(view.y, 3.0);
    }

    #[test]
    fn for_loop_accumulates_energy() {
        let t = compile("trait gain { fn execute(entity) { for i in 0..4 { entity.energy += 1.0; } } }");
        let mut view = sample_view();
        view.energy = 0.0;
        t.execute(&mut view).expect("execute");
        assert_eq!(view.energy, 4.0);
    }

    #[test]
    fn if_else_picks_the_right_branch() {
        let t = compile(
            "trait branch { fn execute(entity) { if entity.energy < 10.0 { entity.energy = 1.0; } else { entity.energy = 2.0; } } }",
        );
        let mut view = sample_view();
        view.energy = 5.0;
        t.execute(&mut view).expect("execute");
        assert_eq!(view.energy, 1.0);
    }

    #[test]
    fn undefined_variable_is_a_runtime_error_not_a_panic() {
        let tokens = lex("trait bad { fn execute(entity) { entity.energy += ghost; } }").expect("lex");
        let def = parse(&tokens).expect("parse");
        let mut seed = GlobalSeed::from_genesis(2);
        let rng = seed.stream(genesis_rng::RngSubsystem::TraitDsl, 0).clone();
        let t = DslTrait::new(def, rng);
        let mut view = sample_view();
        let result = t.execute(&mut view);
        assert!(result.is_err());
    }
}
