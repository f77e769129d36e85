use shared::{
    GameSnapshot, BALL_SIZE, BALL_SPEED, FIELD_HEIGHT, FIELD_WIDTH, PADDLE_HEIGHT, PADDLE_SPEED,
};

use crate::session::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ball {
    pub x: i32,
    pub y: i32,
    pub dx: i32,
    pub dy: i32,
}

impl Ball {
    fn serve() -> Self {
        Self {
            x: FIELD_WIDTH / 2,
            y: FIELD_HEIGHT / 2,
            dx: BALL_SPEED,
            dy: BALL_SPEED,
        }
    }

    /// Returns the ball to the centre, sending it back towards the side that scored.
    fn recenter(&mut self) {
        self.x = FIELD_WIDTH / 2;
        self.y = FIELD_HEIGHT / 2;
        self.dx = -self.dx;
    }
}

/// Authoritative simulation for one session, advanced once per tick.
///
/// All quantities are integers so a given input sequence always produces the
/// same state on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub tick: u32,
    pub paddles: [i32; 2],
    pub ball: Ball,
    pub scores: [u32; 2],
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        let paddle_y = (FIELD_HEIGHT - PADDLE_HEIGHT) / 2;
        Self {
            tick: 0,
            paddles: [paddle_y, paddle_y],
            ball: Ball::serve(),
            scores: [0, 0],
        }
    }

    /// Advances the simulation by one tick. Returns the side that scored, if any.
    pub fn step(&mut self, inputs: [i8; 2]) -> Option<Side> {
        self.tick = self.tick.wrapping_add(1);

        for (paddle, input) in self.paddles.iter_mut().zip(inputs) {
            *paddle = (*paddle + PADDLE_SPEED * i32::from(input))
                .clamp(0, FIELD_HEIGHT - PADDLE_HEIGHT);
        }

        self.ball.x += self.ball.dx;
        self.ball.y += self.ball.dy;

        if self.ball.y <= 0 || self.ball.y >= FIELD_HEIGHT - BALL_SIZE {
            self.ball.dy = -self.ball.dy;
        }

        // Leading-edge test only: the ball's x against each paddle band and
        // its top y against the paddle's vertical extent.
        if self.ball.x <= BALL_SIZE && self.paddle_covers(Side::Left) {
            self.ball.dx = -self.ball.dx;
        }
        if self.ball.x >= FIELD_WIDTH - BALL_SIZE && self.paddle_covers(Side::Right) {
            self.ball.dx = -self.ball.dx;
        }

        let scorer = if self.ball.x <= 0 {
            Some(Side::Right)
        } else if self.ball.x >= FIELD_WIDTH {
            Some(Side::Left)
        } else {
            None
        };

        if let Some(side) = scorer {
            self.scores[side.index()] += 1;
            self.ball.recenter();
        }

        scorer
    }

    fn paddle_covers(&self, side: Side) -> bool {
        let top = self.paddles[side.index()];
        (top..=top + PADDLE_HEIGHT).contains(&self.ball.y)
    }

    /// The first side whose score has reached `win_score`.
    pub fn winner(&self, win_score: u32) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|side| self.scores[side.index()] >= win_score)
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            paddle1_y: self.paddles[0],
            paddle2_y: self.paddles[1],
            ball_x: self.ball.x,
            ball_y: self.ball.y,
            ball_dx: self.ball.dx,
            ball_dy: self.ball.dy,
            score1: self.scores[0],
            score2: self.scores[1],
        }
    }
}
