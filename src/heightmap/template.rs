//! Шаблоны рельефа: упорядоченные операции с диапазонами параметров
//!
//! Встроенные шаблоны рассчитаны на шкалу высот по умолчанию
//! (`0..100`, уровень моря `20`). Координаты `x`/`y` задаются в процентах
//! ширины и высоты карты.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Диапазон `[min, max]`; в TOML записывается массивом `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span(pub f32, pub f32);

impl Span {
    #[must_use]
    pub fn low(self) -> f32 {
        self.0.min(self.1)
    }

    #[must_use]
    pub fn high(self) -> f32 {
        self.0.max(self.1)
    }

    /// Равномерное значение из диапазона.
    pub fn sample<R: Rng>(self, rng: &mut R) -> f32 {
        rng.gen_range(self.low()..=self.high())
    }

    /// Количество повторений операции.
    ///
    /// Вырожденный диапазон `[1.5, 1.5]` даёт 1 плюс ещё одно повторение с вероятностью 0.5;
    /// обычный диапазон — целое число из `[floor(min), floor(max)]`.
    pub fn sample_count<R: Rng>(self, rng: &mut R) -> u32 {
        let (low, high) = (self.low().max(0.0), self.high().max(0.0));
        if (high - low).abs() < f32::EPSILON {
            let whole = low.floor();
            let fraction = f64::from(low - whole);
            whole as u32 + u32::from(fraction > 0.0 && rng.gen_bool(fraction.min(1.0)))
        } else {
            rng.gen_range(low.floor() as u32..=high.floor() as u32)
        }
    }
}

/// Какие высоты затрагивают арифметические операции.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightFilter {
    All,
    /// Только суша; результат не опускается ниже уровня моря.
    Land,
    Band(Span),
}

/// Ось отражения для `Invert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvertAxes {
    X,
    Y,
    Both,
}

/// Направление пролива.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StraitDirection {
    Vertical,
    Horizontal,
}

/// Операция шаблона вместе со своими параметрами.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Холм: затухающая волна от случайной ячейки.
    Hill {
        count: Span,
        height: Span,
        x: Span,
        y: Span,
    },
    /// Впадина: то же, но с вычитанием.
    Pit {
        count: Span,
        height: Span,
        x: Span,
        y: Span,
    },
    /// Горный хребет вдоль случайного пути.
    Range {
        count: Span,
        height: Span,
        x: Span,
        y: Span,
    },
    /// Желоб вдоль случайного пути.
    Trough {
        count: Span,
        height: Span,
        x: Span,
        y: Span,
    },
    /// Пролив через всю карту.
    Strait {
        width: Span,
        direction: StraitDirection,
    },
    /// Радиальное затухание к краям (отрицательная степень — к центру).
    Mask { power: f32 },
    /// Сглаживание средним по соседям.
    Smooth { factor: f32 },
    Add { value: f32, filter: HeightFilter },
    Multiply { factor: f32, filter: HeightFilter },
    /// Отражение карты с заданной вероятностью.
    Invert { probability: f32, axes: InvertAxes },
}

impl Operation {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Hill { .. } => "hill",
            Operation::Pit { .. } => "pit",
            Operation::Range { .. } => "range",
            Operation::Trough { .. } => "trough",
            Operation::Strait { .. } => "strait",
            Operation::Mask { .. } => "mask",
            Operation::Smooth { .. } => "smooth",
            Operation::Add { .. } => "add",
            Operation::Multiply { .. } => "multiply",
            Operation::Invert { .. } => "invert",
        }
    }
}

/// Именованный шаблон рельефа.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub operations: Vec<Operation>,
}

// Компактные конструкторы для встроенной библиотеки.
fn hill(count: (f32, f32), height: (f32, f32), x: (f32, f32), y: (f32, f32)) -> Operation {
    Operation::Hill {
        count: Span(count.0, count.1),
        height: Span(height.0, height.1),
        x: Span(x.0, x.1),
        y: Span(y.0, y.1),
    }
}

fn pit(count: (f32, f32), height: (f32, f32), x: (f32, f32), y: (f32, f32)) -> Operation {
    Operation::Pit {
        count: Span(count.0, count.1),
        height: Span(height.0, height.1),
        x: Span(x.0, x.1),
        y: Span(y.0, y.1),
    }
}

fn range(count: (f32, f32), height: (f32, f32), x: (f32, f32), y: (f32, f32)) -> Operation {
    Operation::Range {
        count: Span(count.0, count.1),
        height: Span(height.0, height.1),
        x: Span(x.0, x.1),
        y: Span(y.0, y.1),
    }
}

fn trough(count: (f32, f32), height: (f32, f32), x: (f32, f32), y: (f32, f32)) -> Operation {
    Operation::Trough {
        count: Span(count.0, count.1),
        height: Span(height.0, height.1),
        x: Span(x.0, x.1),
        y: Span(y.0, y.1),
    }
}

fn strait(width: (f32, f32), direction: StraitDirection) -> Operation {
    Operation::Strait {
        width: Span(width.0, width.1),
        direction,
    }
}

fn mask(power: f32) -> Operation {
    Operation::Mask { power }
}

fn smooth(factor: f32) -> Operation {
    Operation::Smooth { factor }
}

fn add(value: f32, filter: HeightFilter) -> Operation {
    Operation::Add { value, filter }
}

fn multiply(factor: f32, filter: HeightFilter) -> Operation {
    Operation::Multiply { factor, filter }
}

fn invert(probability: f32, axes: InvertAxes) -> Operation {
    Operation::Invert { probability, axes }
}

fn band(min: f32, max: f32) -> HeightFilter {
    HeightFilter::Band(Span(min, max))
}

/// Имена встроенных шаблонов и их веса для выбора `random`.
pub const BUILTIN_TEMPLATES: [(&str, u32); 11] = [
    ("volcano", 3),
    ("high-island", 19),
    ("low-island", 9),
    ("continents", 16),
    ("archipelago", 18),
    ("atoll", 1),
    ("mediterranean", 5),
    ("peninsula", 3),
    ("pangea", 5),
    ("isthmus", 2),
    ("shattered", 7),
];

/// Имя, по которому шаблон выбирается случайно по сиду.
pub const RANDOM_TEMPLATE: &str = "random";

/// Выбор встроенного шаблона по весам.
pub fn pick_weighted<R: Rng>(rng: &mut R) -> &'static str {
    let total: u32 = BUILTIN_TEMPLATES.iter().map(|&(_, w)| w).sum();
    let mut roll = rng.gen_range(0..total);
    for &(name, weight) in &BUILTIN_TEMPLATES {
        if roll < weight {
            return name;
        }
        roll -= weight;
    }
    BUILTIN_TEMPLATES[0].0
}

/// Встроенный шаблон по имени.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn builtin(name: &str) -> Option<Template> {
    use HeightFilter::{All, Land};
    use StraitDirection::{Horizontal, Vertical};

    let operations = match name {
        "volcano" => vec![
            hill((1.0, 1.0), (90.0, 100.0), (44.0, 56.0), (40.0, 60.0)),
            multiply(0.8, band(50.0, 100.0)),
            range((1.5, 1.5), (30.0, 55.0), (45.0, 55.0), (40.0, 60.0)),
            smooth(3.0),
            hill((1.5, 1.5), (35.0, 45.0), (25.0, 30.0), (20.0, 75.0)),
            hill((1.0, 1.0), (35.0, 55.0), (75.0, 80.0), (25.0, 75.0)),
            hill((0.5, 0.5), (20.0, 25.0), (10.0, 15.0), (20.0, 25.0)),
            mask(3.0),
        ],
        "high-island" => vec![
            hill((1.0, 1.0), (90.0, 100.0), (65.0, 75.0), (47.0, 53.0)),
            add(7.0, All),
            hill((5.0, 6.0), (20.0, 30.0), (25.0, 55.0), (45.0, 55.0)),
            range((1.0, 1.0), (40.0, 50.0), (45.0, 55.0), (45.0, 55.0)),
            multiply(0.8, Land),
            mask(3.0),
            smooth(2.0),
            trough((2.0, 3.0), (20.0, 30.0), (20.0, 30.0), (20.0, 30.0)),
            trough((2.0, 3.0), (20.0, 30.0), (60.0, 80.0), (70.0, 80.0)),
            hill((1.0, 1.0), (10.0, 15.0), (60.0, 60.0), (50.0, 50.0)),
            hill((1.5, 1.5), (13.0, 16.0), (15.0, 20.0), (20.0, 75.0)),
            range((1.5, 1.5), (30.0, 40.0), (15.0, 85.0), (30.0, 40.0)),
            range((1.5, 1.5), (30.0, 40.0), (15.0, 85.0), (60.0, 70.0)),
            pit((3.0, 5.0), (10.0, 30.0), (15.0, 85.0), (20.0, 80.0)),
        ],
        "low-island" => vec![
            hill((1.0, 1.0), (90.0, 99.0), (60.0, 80.0), (45.0, 55.0)),
            hill((1.0, 2.0), (20.0, 30.0), (10.0, 30.0), (10.0, 90.0)),
            smooth(2.0),
            hill((6.0, 7.0), (25.0, 35.0), (20.0, 70.0), (30.0, 70.0)),
            range((1.0, 1.0), (40.0, 50.0), (45.0, 55.0), (45.0, 55.0)),
            trough((2.0, 3.0), (20.0, 30.0), (15.0, 85.0), (20.0, 30.0)),
            trough((2.0, 3.0), (20.0, 30.0), (15.0, 85.0), (70.0, 80.0)),
            hill((1.5, 1.5), (10.0, 15.0), (5.0, 15.0), (20.0, 80.0)),
            hill((1.0, 1.0), (10.0, 15.0), (85.0, 95.0), (70.0, 80.0)),
            pit((5.0, 7.0), (15.0, 25.0), (15.0, 85.0), (20.0, 80.0)),
            multiply(0.4, band(20.0, 100.0)),
            mask(4.0),
        ],
        "continents" => vec![
            hill((1.0, 1.0), (80.0, 85.0), (60.0, 80.0), (40.0, 60.0)),
            hill((1.0, 1.0), (80.0, 85.0), (20.0, 30.0), (40.0, 60.0)),
            hill((6.0, 7.0), (15.0, 30.0), (25.0, 75.0), (15.0, 85.0)),
            multiply(0.6, Land),
            hill((8.0, 10.0), (5.0, 10.0), (15.0, 85.0), (20.0, 80.0)),
            range((1.0, 2.0), (30.0, 60.0), (5.0, 15.0), (25.0, 75.0)),
            range((1.0, 2.0), (30.0, 60.0), (80.0, 95.0), (25.0, 75.0)),
            range((0.0, 3.0), (30.0, 60.0), (80.0, 90.0), (20.0, 80.0)),
            strait((2.0, 2.0), Vertical),
            strait((1.0, 1.0), Vertical),
            smooth(3.0),
            trough((3.0, 4.0), (15.0, 20.0), (15.0, 85.0), (20.0, 80.0)),
            trough((3.0, 4.0), (5.0, 10.0), (45.0, 55.0), (45.0, 55.0)),
            pit((3.0, 4.0), (10.0, 20.0), (15.0, 85.0), (20.0, 80.0)),
            mask(4.0),
        ],
        "archipelago" => vec![
            add(11.0, All),
            range((2.0, 3.0), (40.0, 60.0), (20.0, 80.0), (20.0, 80.0)),
            hill((5.0, 5.0), (15.0, 20.0), (10.0, 90.0), (30.0, 70.0)),
            hill((2.0, 2.0), (10.0, 15.0), (10.0, 30.0), (20.0, 80.0)),
            hill((2.0, 2.0), (10.0, 15.0), (60.0, 90.0), (20.0, 80.0)),
            smooth(3.0),
            trough((10.0, 10.0), (20.0, 30.0), (5.0, 95.0), (5.0, 95.0)),
            strait((2.0, 2.0), Vertical),
            strait((2.0, 2.0), Horizontal),
        ],
        "atoll" => vec![
            hill((1.0, 1.0), (75.0, 80.0), (50.0, 60.0), (45.0, 55.0)),
            hill((1.5, 1.5), (30.0, 50.0), (25.0, 75.0), (30.0, 70.0)),
            hill((0.5, 0.5), (30.0, 50.0), (25.0, 35.0), (30.0, 70.0)),
            smooth(1.0),
            multiply(0.2, band(25.0, 100.0)),
            hill((0.5, 0.5), (10.0, 20.0), (50.0, 55.0), (48.0, 52.0)),
        ],
        "mediterranean" => vec![
            range((4.0, 6.0), (30.0, 80.0), (0.0, 100.0), (0.0, 10.0)),
            range((4.0, 6.0), (30.0, 80.0), (0.0, 100.0), (90.0, 100.0)),
            hill((6.0, 8.0), (30.0, 50.0), (10.0, 90.0), (0.0, 5.0)),
            hill((6.0, 8.0), (30.0, 50.0), (10.0, 90.0), (95.0, 100.0)),
            multiply(0.9, Land),
            mask(-2.0),
            smooth(1.0),
            hill((2.0, 3.0), (30.0, 70.0), (0.0, 5.0), (20.0, 80.0)),
            hill((2.0, 3.0), (30.0, 70.0), (95.0, 100.0), (20.0, 80.0)),
            trough((3.0, 6.0), (40.0, 50.0), (0.0, 100.0), (0.0, 10.0)),
            trough((3.0, 6.0), (40.0, 50.0), (0.0, 100.0), (90.0, 100.0)),
        ],
        "peninsula" => vec![
            range((2.0, 3.0), (20.0, 35.0), (40.0, 50.0), (0.0, 15.0)),
            add(5.0, All),
            hill((1.0, 1.0), (90.0, 100.0), (10.0, 90.0), (0.0, 5.0)),
            add(13.0, All),
            hill((3.0, 4.0), (3.0, 5.0), (5.0, 95.0), (80.0, 100.0)),
            hill((1.0, 2.0), (3.0, 5.0), (5.0, 95.0), (40.0, 60.0)),
            trough((5.0, 6.0), (10.0, 25.0), (5.0, 95.0), (5.0, 95.0)),
            smooth(3.0),
            invert(0.4, InvertAxes::Both),
        ],
        "pangea" => vec![
            hill((1.0, 2.0), (25.0, 40.0), (15.0, 50.0), (0.0, 10.0)),
            hill((1.0, 2.0), (5.0, 40.0), (50.0, 85.0), (0.0, 10.0)),
            hill((1.0, 2.0), (25.0, 40.0), (50.0, 85.0), (90.0, 100.0)),
            hill((1.0, 2.0), (5.0, 40.0), (15.0, 50.0), (90.0, 100.0)),
            hill((8.0, 12.0), (20.0, 40.0), (20.0, 80.0), (48.0, 52.0)),
            smooth(2.0),
            multiply(0.7, Land),
            trough((3.0, 4.0), (25.0, 35.0), (5.0, 95.0), (10.0, 20.0)),
            trough((3.0, 4.0), (25.0, 35.0), (5.0, 95.0), (80.0, 90.0)),
            range((5.0, 6.0), (30.0, 40.0), (10.0, 90.0), (35.0, 65.0)),
        ],
        "isthmus" => vec![
            hill((5.0, 10.0), (15.0, 30.0), (0.0, 30.0), (0.0, 20.0)),
            hill((5.0, 10.0), (15.0, 30.0), (10.0, 50.0), (20.0, 40.0)),
            hill((5.0, 10.0), (15.0, 30.0), (30.0, 70.0), (40.0, 60.0)),
            hill((5.0, 10.0), (15.0, 30.0), (50.0, 90.0), (60.0, 80.0)),
            hill((5.0, 10.0), (15.0, 30.0), (70.0, 100.0), (80.0, 100.0)),
            smooth(2.0),
            trough((4.0, 8.0), (15.0, 30.0), (0.0, 30.0), (0.0, 20.0)),
            trough((4.0, 8.0), (15.0, 30.0), (10.0, 50.0), (20.0, 40.0)),
            trough((4.0, 8.0), (15.0, 30.0), (30.0, 70.0), (40.0, 60.0)),
            trough((4.0, 8.0), (15.0, 30.0), (50.0, 90.0), (60.0, 80.0)),
            trough((4.0, 8.0), (15.0, 30.0), (70.0, 100.0), (80.0, 100.0)),
            invert(0.25, InvertAxes::X),
        ],
        "shattered" => vec![
            hill((8.0, 8.0), (35.0, 40.0), (15.0, 85.0), (30.0, 70.0)),
            trough((10.0, 20.0), (40.0, 50.0), (5.0, 95.0), (5.0, 95.0)),
            range((5.0, 7.0), (30.0, 40.0), (10.0, 90.0), (20.0, 80.0)),
            pit((12.0, 20.0), (30.0, 40.0), (15.0, 85.0), (20.0, 80.0)),
        ],
        _ => return None,
    };

    Some(Template {
        name: name.to_string(),
        operations,
    })
}
